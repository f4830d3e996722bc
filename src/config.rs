// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for ACL synchronization and authorization checks.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::identity::Sid;

/// Authority held by system administrators.
pub const DEFAULT_ADMINISTRATOR_AUTHORITY: &str = "GROUP_ADMIN";

/// Authority held by service agents (pipelines, scheduled jobs) which need to see everything.
pub const DEFAULT_AGENT_AUTHORITY: &str = "GROUP_AGENT";

/// Authority every caller holds, including unauthenticated ones. Granting READ to it makes an
/// object public.
pub const DEFAULT_ANONYMOUS_AUTHORITY: &str = "IS_AUTHENTICATED_ANONYMOUSLY";

/// Default number of attempts to apply a change to an ACL which was concurrently modified.
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: usize = 3;

/// Configuration parameters for the synchronizer and the security service.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Names of the well-known authorities.
    pub authorities: Authorities,

    /// How often a change to an ACL (a parent reconciliation or a service operation) is
    /// re-applied after the store reported a concurrent modification of the same ACL.
    pub max_update_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authorities: Authorities::default(),
            max_update_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
        }
    }
}

/// Names of the authorities the synchronizer grants baseline permissions to and the
/// authorization strategy accepts as administrative.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Authorities {
    /// Receives ADMINISTRATION on every ACL which does not inherit.
    pub administrator: String,

    /// Receives READ on every ACL which does not inherit.
    pub agent: String,

    /// Held by everyone, used to make objects public.
    pub anonymous: String,

    /// Authority allowed to change entries of any ACL.
    pub change_general: String,

    /// Authority allowed to transfer ownership of any ACL.
    pub change_ownership: String,

    /// Authority allowed to change auditing settings of any ACL.
    pub change_auditing: String,
}

impl Authorities {
    pub fn administrator_sid(&self) -> Sid {
        Sid::authority(&self.administrator)
    }

    pub fn agent_sid(&self) -> Sid {
        Sid::authority(&self.agent)
    }

    pub fn anonymous_sid(&self) -> Sid {
        Sid::authority(&self.anonymous)
    }
}

impl Default for Authorities {
    fn default() -> Self {
        Self {
            administrator: DEFAULT_ADMINISTRATOR_AUTHORITY.to_string(),
            agent: DEFAULT_AGENT_AUTHORITY.to_string(),
            anonymous: DEFAULT_ANONYMOUS_AUTHORITY.to_string(),
            change_general: DEFAULT_ADMINISTRATOR_AUTHORITY.to_string(),
            change_ownership: DEFAULT_ADMINISTRATOR_AUTHORITY.to_string(),
            change_auditing: DEFAULT_ADMINISTRATOR_AUTHORITY.to_string(),
        }
    }
}
