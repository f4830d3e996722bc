// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of the security identities reachable by a caller.
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::caller::Caller;
use crate::identity::Sid;
use crate::traits::SidResolver;

/// Resolves a caller to its principal plus every authority it holds, directly or through an
/// authority hierarchy (for example `GROUP_ADMIN` implying `GROUP_USER`).
///
/// Every caller, authenticated or not, additionally reaches the anonymous authority.
#[derive(Clone, Debug)]
pub struct DefaultSidResolver {
    anonymous_authority: String,
    implied: BTreeMap<String, BTreeSet<String>>,
}

impl DefaultSidResolver {
    pub fn new(anonymous_authority: impl Into<String>) -> Self {
        Self {
            anonymous_authority: anonymous_authority.into(),
            implied: BTreeMap::new(),
        }
    }

    /// Declare that holding `authority` also grants `implied`.
    pub fn imply(mut self, authority: impl Into<String>, implied: impl Into<String>) -> Self {
        self.implied
            .entry(authority.into())
            .or_default()
            .insert(implied.into());
        self
    }

    /// All authorities reachable from the given ones, including themselves.
    fn reachable_authorities<'a>(&self, held: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
        let mut reachable = BTreeSet::new();
        let mut queue: VecDeque<String> = held.map(str::to_string).collect();

        while let Some(authority) = queue.pop_front() {
            if !reachable.insert(authority.clone()) {
                continue;
            }

            if let Some(implied) = self.implied.get(&authority) {
                queue.extend(implied.iter().cloned());
            }
        }

        reachable
    }
}

impl Default for DefaultSidResolver {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ANONYMOUS_AUTHORITY)
    }
}

impl SidResolver for DefaultSidResolver {
    fn reachable_identities(&self, caller: &Caller) -> Vec<Sid> {
        let mut sids = Vec::new();
        if !caller.is_anonymous() {
            sids.push(caller.sid());
        }

        let mut authorities = self.reachable_authorities(caller.authorities());
        authorities.insert(self.anonymous_authority.clone());
        sids.extend(authorities.into_iter().map(Sid::Authority));

        sids
    }
}

#[cfg(test)]
mod tests {
    use crate::caller::Caller;
    use crate::identity::Sid;
    use crate::traits::SidResolver;

    use super::DefaultSidResolver;

    #[test]
    fn principal_comes_first() {
        let resolver = DefaultSidResolver::default();
        let caller = Caller::authenticated("alice", ["GROUP_USER"]);

        assert_eq!(
            resolver.reachable_identities(&caller),
            vec![
                Sid::principal("alice"),
                Sid::authority("GROUP_USER"),
                Sid::authority("IS_AUTHENTICATED_ANONYMOUSLY"),
            ]
        );
    }

    #[test]
    fn follows_hierarchy_without_looping() {
        let resolver = DefaultSidResolver::default()
            .imply("GROUP_ADMIN", "GROUP_AGENT")
            .imply("GROUP_AGENT", "GROUP_USER")
            .imply("GROUP_USER", "GROUP_ADMIN");
        let caller = Caller::authenticated("bob", ["GROUP_ADMIN"]);

        let sids = resolver.reachable_identities(&caller);
        assert_eq!(sids.len(), 5);
        assert!(sids.contains(&Sid::authority("GROUP_USER")));
    }

    #[test]
    fn anonymous_reaches_only_anonymous_authority() {
        let resolver = DefaultSidResolver::default();
        assert_eq!(
            resolver.reachable_identities(&Caller::anonymous()),
            vec![Sid::authority("IS_AUTHENTICATED_ANONYMOUSLY")]
        );
    }
}
