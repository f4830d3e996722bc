// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use thiserror::Error;

use crate::acl::Acl;
use crate::caller::Caller;
use crate::config::Authorities;
use crate::identity::{ObjectIdentity, Sid};
use crate::permission::Permission;
use crate::traits::SidResolver;

/// Kind of change about to be applied to an existing ACL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Entries, parent or inheritance flag.
    General,

    /// Owner.
    Ownership,

    /// Auditing settings.
    Auditing,
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::General => "general",
            ChangeKind::Ownership => "ownership",
            ChangeKind::Auditing => "auditing",
        };

        write!(f, "{}", s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("authentication is required to change the acl of {0}")]
    Unauthenticated(ObjectIdentity),

    #[error("{sid} may not apply {change} changes to the acl of {identity}")]
    Denied {
        identity: ObjectIdentity,
        change: ChangeKind,
        sid: Sid,
    },
}

/// Decides whether a caller may mutate an existing ACL.
///
/// Owners may apply general and ownership changes to their own ACLs. Everyone else needs the
/// administrative authority configured for the change kind, or an entry granting
/// ADMINISTRATION in the ACL itself.
#[derive(Clone, Debug)]
pub struct AuthorizationStrategy<R> {
    resolver: R,
    authorities: Authorities,
}

impl<R> AuthorizationStrategy<R>
where
    R: SidResolver,
{
    pub fn new(resolver: R, authorities: Authorities) -> Self {
        Self {
            resolver,
            authorities,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    fn required_authority(&self, change: ChangeKind) -> &str {
        match change {
            ChangeKind::General => &self.authorities.change_general,
            ChangeKind::Ownership => &self.authorities.change_ownership,
            ChangeKind::Auditing => &self.authorities.change_auditing,
        }
    }

    pub fn check_may_mutate(
        &self,
        caller: &Caller,
        acl: &Acl,
        change: ChangeKind,
    ) -> Result<(), AccessDenied> {
        if caller.is_anonymous() {
            return Err(AccessDenied::Unauthenticated(acl.identity()));
        }

        let sid = caller.sid();
        if &sid == acl.owner() && matches!(change, ChangeKind::General | ChangeKind::Ownership) {
            return Ok(());
        }

        let reachable = self.resolver.reachable_identities(caller);
        let required = Sid::authority(self.required_authority(change));
        if reachable.contains(&required) {
            return Ok(());
        }

        // The first administration entry matching any reachable sid decides.
        let administration = acl.entries().iter().find(|ace| {
            ace.permission == Permission::Administration && reachable.contains(&ace.sid)
        });
        if administration.is_some_and(|ace| ace.granting) {
            return Ok(());
        }

        Err(AccessDenied::Denied {
            identity: acl.identity(),
            change,
            sid,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::acl::{Ace, Acl};
    use crate::caller::Caller;
    use crate::config::Authorities;
    use crate::identity::{ObjectIdentity, Sid};
    use crate::permission::Permission;
    use crate::sid::DefaultSidResolver;

    use super::{AccessDenied, AuthorizationStrategy, ChangeKind};

    fn strategy() -> AuthorizationStrategy<DefaultSidResolver> {
        AuthorizationStrategy::new(DefaultSidResolver::default(), Authorities::default())
    }

    fn acl_owned_by(owner: &str) -> Acl {
        Acl::new(ObjectIdentity::new("dataset", 1), Sid::principal(owner))
    }

    #[test]
    fn owner_may_change_entries_and_ownership() {
        let acl = acl_owned_by("alice");
        let alice = Caller::authenticated("alice", ["GROUP_USER"]);

        assert_eq!(strategy().check_may_mutate(&alice, &acl, ChangeKind::General), Ok(()));
        assert_eq!(strategy().check_may_mutate(&alice, &acl, ChangeKind::Ownership), Ok(()));
        assert!(matches!(
            strategy().check_may_mutate(&alice, &acl, ChangeKind::Auditing),
            Err(AccessDenied::Denied {
                change: ChangeKind::Auditing,
                ..
            })
        ));
    }

    #[test]
    fn administrators_may_change_everything() {
        let acl = acl_owned_by("alice");
        let bob = Caller::authenticated("bob", ["GROUP_ADMIN"]);

        for change in [ChangeKind::General, ChangeKind::Ownership, ChangeKind::Auditing] {
            assert_eq!(strategy().check_may_mutate(&bob, &acl, change), Ok(()));
        }
    }

    #[test]
    fn administration_entry_grants_access() {
        let mut acl = acl_owned_by("alice");
        let carol = Caller::authenticated("carol", ["GROUP_LAB"]);
        assert!(strategy().check_may_mutate(&carol, &acl, ChangeKind::General).is_err());

        acl.push_ace(Ace::grant(Permission::Administration, Sid::authority("GROUP_LAB")));
        assert_eq!(strategy().check_may_mutate(&carol, &acl, ChangeKind::General), Ok(()));

        acl.insert_ace(0, Ace::deny(Permission::Administration, Sid::principal("carol")));
        assert!(strategy().check_may_mutate(&carol, &acl, ChangeKind::General).is_err());
    }

    #[test]
    fn anonymous_is_always_denied() {
        let mut acl = acl_owned_by("anonymousUser");
        acl.push_ace(Ace::grant(
            Permission::Administration,
            Sid::authority("IS_AUTHENTICATED_ANONYMOUSLY"),
        ));

        assert_eq!(
            strategy().check_may_mutate(&Caller::anonymous(), &acl, ChangeKind::General),
            Err(AccessDenied::Unauthenticated(acl.identity()))
        );
    }
}
