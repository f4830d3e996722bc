// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::caller::Caller;
use crate::identity::Sid;

/// Maps a caller to every security identity it may hold permissions through.
pub trait SidResolver {
    /// The caller's own principal followed by all reachable authorities.
    fn reachable_identities(&self, caller: &Caller) -> Vec<Sid>;
}
