// SPDX-License-Identifier: MIT OR Apache-2.0

//! High-level permission management on top of stored ACLs.
//!
//! The service works on ACLs created by the [`Synchronizer`](crate::sync::Synchronizer): it
//! changes owners, makes objects public or private and shares them with groups. Every mutation is
//! checked with [`AuthorizationStrategy::check_may_mutate`] first.
use std::collections::{BTreeSet, HashSet};

use thiserror::Error;
use tracing::debug;

use crate::acl::{Ace, Acl};
use crate::caller::Caller;
use crate::config::{Authorities, Config};
use crate::evaluate::is_granted;
use crate::identity::{ObjectIdentity, Sid};
use crate::permission::Permission;
use crate::strategy::{AccessDenied, AuthorizationStrategy, ChangeKind};
use crate::traits::{AclStore, SidResolver, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no acl found for {0}")]
    AclNotFound(ObjectIdentity),

    #[error("{0} is reserved and can not be used as a group authority")]
    ReservedAuthority(String),

    #[error("acl of {0} was modified concurrently {1} times, giving up")]
    TooManyConflicts(ObjectIdentity, usize),

    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug)]
pub struct SecurityService<S, R> {
    store: S,
    strategy: AuthorizationStrategy<R>,
    authorities: Authorities,
    max_update_attempts: usize,
}

impl<S, R> SecurityService<S, R>
where
    S: AclStore,
    R: SidResolver,
{
    pub fn new(store: S, resolver: R, config: &Config) -> Self {
        Self {
            store,
            strategy: AuthorizationStrategy::new(resolver, config.authorities.clone()),
            authorities: config.authorities.clone(),
            max_update_attempts: config.max_update_attempts,
        }
    }

    /// Apply `change` to the ACL of `identity` once the caller may make it. `change` returns
    /// whether it modified the ACL, nothing is written otherwise.
    ///
    /// When the ACL was modified concurrently it is read again and `change` re-applied, up to
    /// `max_update_attempts` times.
    fn modify<F>(
        &self,
        caller: &Caller,
        identity: ObjectIdentity,
        kind: ChangeKind,
        mut change: F,
    ) -> Result<bool, ServiceError>
    where
        F: FnMut(&mut Acl) -> Result<bool, ServiceError>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut acl = self.acl(identity)?;
            self.strategy.check_may_mutate(caller, &acl, kind)?;

            if !change(&mut acl)? {
                return Ok(false);
            }

            match self.store.update(&mut acl) {
                Ok(()) => return Ok(true),
                Err(StoreError::Stale { .. }) if attempts < self.max_update_attempts => {
                    debug!(%identity, attempts, "acl modified concurrently, retrying");
                }
                Err(StoreError::Stale { .. }) => {
                    return Err(ServiceError::TooManyConflicts(identity, attempts));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn acl(&self, identity: ObjectIdentity) -> Result<Acl, ServiceError> {
        self.store
            .read(&identity)?
            .ok_or(ServiceError::AclNotFound(identity))
    }

    fn reserved(&self) -> [Sid; 3] {
        [
            self.authorities.administrator_sid(),
            self.authorities.agent_sid(),
            self.authorities.anonymous_sid(),
        ]
    }

    fn group_sid(&self, group_authority: &str) -> Result<Sid, ServiceError> {
        let sid = Sid::authority(group_authority);
        if self.reserved().contains(&sid) {
            return Err(ServiceError::ReservedAuthority(group_authority.to_string()));
        }
        Ok(sid)
    }

    pub fn owner(&self, identity: ObjectIdentity) -> Result<Sid, ServiceError> {
        Ok(self.acl(identity)?.owner().clone())
    }

    /// Returns `true` if anonymous users may read the object, possibly through inheritance.
    pub fn is_public(&self, identity: ObjectIdentity) -> Result<bool, ServiceError> {
        let acl = self.acl(identity)?;
        self.is_public_acl(&acl)
    }

    fn is_public_acl(&self, acl: &Acl) -> Result<bool, ServiceError> {
        let anonymous = [self.authorities.anonymous_sid()];
        Ok(is_granted(
            &self.store,
            acl,
            Permission::Read.into(),
            &anonymous,
        )?)
    }

    pub fn is_private(&self, identity: ObjectIdentity) -> Result<bool, ServiceError> {
        Ok(!self.is_public(identity)?)
    }

    /// Returns `true` if any group other than the built-in authorities may read or write the
    /// object.
    pub fn is_shared(&self, identity: ObjectIdentity) -> Result<bool, ServiceError> {
        let acl = self.acl(identity)?;
        let reserved = self.reserved();

        for sid in self.authorities_in_chain(&acl)? {
            if reserved.contains(&sid) {
                continue;
            }

            if is_granted(
                &self.store,
                &acl,
                Permission::Read | Permission::Write,
                std::slice::from_ref(&sid),
            )? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// All authorities named by entries of `acl` or the ACLs it inherits from.
    fn authorities_in_chain(&self, acl: &Acl) -> Result<BTreeSet<Sid>, ServiceError> {
        let mut authorities = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut current = Some(acl.clone());

        while let Some(acl) = current.take() {
            if !visited.insert(acl.identity()) {
                break;
            }

            authorities.extend(
                acl.entries()
                    .iter()
                    .filter(|ace| ace.sid.is_authority())
                    .map(|ace| ace.sid.clone()),
            );

            if let Some(parent) = acl.parent().filter(|_| acl.is_entries_inheriting()) {
                current = self.store.read(&parent)?;
            }
        }

        Ok(authorities)
    }

    pub fn make_public(&self, caller: &Caller, identity: ObjectIdentity) -> Result<(), ServiceError> {
        let anonymous = self.authorities.anonymous_sid();
        let changed = self.modify(caller, identity, ChangeKind::General, |acl| {
            if self.is_public_acl(acl)? {
                return Ok(false);
            }

            acl.remove_aces(Permission::Read, &anonymous);
            acl.insert_ace(0, Ace::grant(Permission::Read, anonymous.clone()));
            Ok(true)
        })?;

        if changed {
            debug!(%identity, "made public");
        } else {
            debug!(%identity, "already public");
        }
        Ok(())
    }

    /// Revoke anonymous read access. When the object would still be public through its parent,
    /// an explicit deny entry is added.
    pub fn make_private(&self, caller: &Caller, identity: ObjectIdentity) -> Result<(), ServiceError> {
        let anonymous = self.authorities.anonymous_sid();
        let changed = self.modify(caller, identity, ChangeKind::General, |acl| {
            if !self.is_public_acl(acl)? {
                return Ok(false);
            }

            acl.remove_aces(Permission::Read, &anonymous);
            if self.is_public_acl(acl)? {
                acl.insert_ace(0, Ace::deny(Permission::Read, anonymous.clone()));
            }
            Ok(true)
        })?;

        if changed {
            debug!(%identity, "made private");
        } else {
            debug!(%identity, "already private");
        }
        Ok(())
    }

    pub fn set_owner(
        &self,
        caller: &Caller,
        identity: ObjectIdentity,
        owner: Sid,
    ) -> Result<(), ServiceError> {
        self.modify(caller, identity, ChangeKind::Ownership, |acl| {
            if acl.owner() == &owner {
                return Ok(false);
            }

            debug!(%identity, from = %acl.owner(), to = %owner, "changing owner");
            acl.set_owner(owner.clone());
            Ok(true)
        })?;

        Ok(())
    }

    /// Grant READ to a group.
    pub fn make_readable_by_group(
        &self,
        caller: &Caller,
        identity: ObjectIdentity,
        group_authority: &str,
    ) -> Result<(), ServiceError> {
        self.grant_to_group(caller, identity, group_authority, &[Permission::Read])
    }

    /// Grant READ and WRITE to a group.
    pub fn make_writeable_by_group(
        &self,
        caller: &Caller,
        identity: ObjectIdentity,
        group_authority: &str,
    ) -> Result<(), ServiceError> {
        self.grant_to_group(
            caller,
            identity,
            group_authority,
            &[Permission::Read, Permission::Write],
        )
    }

    /// Revoke READ and WRITE from a group.
    pub fn make_unreadable_by_group(
        &self,
        caller: &Caller,
        identity: ObjectIdentity,
        group_authority: &str,
    ) -> Result<(), ServiceError> {
        self.revoke_from_group(
            caller,
            identity,
            group_authority,
            &[Permission::Read, Permission::Write],
        )
    }

    /// Revoke WRITE from a group, READ is kept.
    pub fn make_unwriteable_by_group(
        &self,
        caller: &Caller,
        identity: ObjectIdentity,
        group_authority: &str,
    ) -> Result<(), ServiceError> {
        self.revoke_from_group(caller, identity, group_authority, &[Permission::Write])
    }

    fn grant_to_group(
        &self,
        caller: &Caller,
        identity: ObjectIdentity,
        group_authority: &str,
        permissions: &[Permission],
    ) -> Result<(), ServiceError> {
        let sid = self.group_sid(group_authority)?;
        let changed = self.modify(caller, identity, ChangeKind::General, |acl| {
            let mut changed = false;
            for permission in permissions {
                if !acl.grants(*permission, &sid) {
                    acl.remove_aces(*permission, &sid);
                    acl.insert_ace(0, Ace::grant(*permission, sid.clone()));
                    changed = true;
                }
            }
            Ok(changed)
        })?;

        if changed {
            debug!(%identity, group = group_authority, ?permissions, "granted to group");
        }
        Ok(())
    }

    fn revoke_from_group(
        &self,
        caller: &Caller,
        identity: ObjectIdentity,
        group_authority: &str,
        permissions: &[Permission],
    ) -> Result<(), ServiceError> {
        let sid = self.group_sid(group_authority)?;
        let changed = self.modify(caller, identity, ChangeKind::General, |acl| {
            let mut changed = false;
            for permission in permissions {
                changed |= acl.remove_aces(*permission, &sid);
            }
            Ok(changed)
        })?;

        if changed {
            debug!(%identity, group = group_authority, ?permissions, "revoked from group");
        }
        Ok(())
    }
}
