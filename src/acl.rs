// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access control lists and their entries.
use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::Serialize;
use thiserror::Error;

use crate::identity::{ObjectIdentity, Sid};
use crate::permission::Permission;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AclError {
    #[error("acl of {identity} already has parent {existing}, refusing to change it to {candidate}")]
    ParentAlreadySet {
        identity: ObjectIdentity,
        existing: ObjectIdentity,
        candidate: ObjectIdentity,
    },

    #[error("acl of {0} can not be its own parent")]
    SelfParent(ObjectIdentity),
}

/// A single access control entry: grants or denies one permission to one security identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Ace {
    pub permission: Permission,
    pub sid: Sid,
    pub granting: bool,
}

impl Ace {
    pub fn grant(permission: Permission, sid: Sid) -> Self {
        Self {
            permission,
            sid,
            granting: true,
        }
    }

    pub fn deny(permission: Permission, sid: Sid) -> Self {
        Self {
            permission,
            sid,
            granting: false,
        }
    }
}

/// Access control list of one securable object.
///
/// Entries are ordered, the first entry matching a permission request decides the outcome. The
/// parent is referenced by identity and resolved through the store, as it is persisted
/// separately.
///
/// `version` is maintained by the store and guards against lost updates, see
/// [`AclStore::update`](crate::traits::AclStore::update).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Acl {
    identity: ObjectIdentity,
    owner: Sid,
    entries: Vec<Ace>,
    parent: Option<ObjectIdentity>,
    entries_inheriting: bool,
    version: u64,
}

impl Acl {
    pub fn new(identity: ObjectIdentity, owner: Sid) -> Self {
        Self {
            identity,
            owner,
            entries: Vec::new(),
            parent: None,
            entries_inheriting: false,
            version: 0,
        }
    }

    pub fn identity(&self) -> ObjectIdentity {
        self.identity
    }

    pub fn owner(&self) -> &Sid {
        &self.owner
    }

    pub fn set_owner(&mut self, owner: Sid) {
        self.owner = owner;
    }

    pub fn entries(&self) -> &[Ace] {
        &self.entries
    }

    pub fn parent(&self) -> Option<ObjectIdentity> {
        self.parent
    }

    pub fn is_entries_inheriting(&self) -> bool {
        self.entries_inheriting
    }

    pub fn set_entries_inheriting(&mut self, entries_inheriting: bool) {
        self.entries_inheriting = entries_inheriting;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Insert an entry at `index`, shifting later entries back. Indices past the end append.
    pub fn insert_ace(&mut self, index: usize, ace: Ace) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, ace);
    }

    /// Append an entry, giving it the lowest precedence.
    pub fn push_ace(&mut self, ace: Ace) {
        self.entries.push(ace);
    }

    /// Remove all entries for the given permission and sid. Returns `true` if any were removed.
    pub fn remove_aces(&mut self, permission: Permission, sid: &Sid) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|ace| !(ace.permission == permission && &ace.sid == sid));
        before != self.entries.len()
    }

    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    /// Returns `true` if an entry grants `permission` to `sid`.
    pub fn grants(&self, permission: Permission, sid: &Sid) -> bool {
        self.entries
            .iter()
            .any(|ace| ace.granting && ace.permission == permission && &ace.sid == sid)
    }

    /// Attach a parent.
    ///
    /// Parents are set once: attaching the parent which is already recorded is a no-op and
    /// returns `false`, attaching a different one fails. Use [`Acl::reparent`] to move an ACL
    /// deliberately.
    pub fn set_parent(&mut self, parent: ObjectIdentity) -> Result<bool, AclError> {
        if parent == self.identity {
            return Err(AclError::SelfParent(self.identity));
        }

        match self.parent {
            Some(existing) if existing == parent => Ok(false),
            Some(existing) => Err(AclError::ParentAlreadySet {
                identity: self.identity,
                existing,
                candidate: parent,
            }),
            None => {
                self.parent = Some(parent);
                Ok(true)
            }
        }
    }

    /// Replace or remove the parent regardless of what was recorded before.
    pub fn reparent(&mut self, parent: Option<ObjectIdentity>) -> Result<(), AclError> {
        if parent == Some(self.identity) {
            return Err(AclError::SelfParent(self.identity));
        }
        self.parent = parent;
        Ok(())
    }

    /// Returns `true` if both entry lists hold the same permission and sid pairs, ignoring
    /// their order.
    pub fn has_same_entries(&self, other: &[Ace]) -> bool {
        let ours: HashSet<(Permission, &Sid)> = self
            .entries
            .iter()
            .map(|ace| (ace.permission, &ace.sid))
            .collect();
        let theirs: HashSet<(Permission, &Sid)> =
            other.iter().map(|ace| (ace.permission, &ace.sid)).collect();
        ours == theirs
    }
}

#[cfg(test)]
mod tests {
    use crate::identity::{ObjectIdentity, Sid};
    use crate::permission::Permission;

    use super::{Ace, Acl, AclError};

    fn dataset(key: u64) -> ObjectIdentity {
        ObjectIdentity::new("dataset", key)
    }

    #[test]
    fn insert_at_front_reverses_order() {
        let mut acl = Acl::new(dataset(1), Sid::principal("alice"));
        acl.insert_ace(0, Ace::grant(Permission::Administration, Sid::authority("GROUP_ADMIN")));
        acl.insert_ace(0, Ace::grant(Permission::Read, Sid::authority("GROUP_AGENT")));
        acl.insert_ace(99, Ace::grant(Permission::Read, Sid::principal("bob")));

        let permissions: Vec<_> = acl.entries().iter().map(|ace| ace.permission).collect();
        assert_eq!(
            permissions,
            vec![Permission::Read, Permission::Administration, Permission::Read]
        );
        assert_eq!(acl.entries()[2].sid, Sid::principal("bob"));
    }

    #[test]
    fn parent_is_set_once() {
        let mut acl = Acl::new(dataset(2), Sid::principal("alice"));
        assert_eq!(acl.set_parent(dataset(1)), Ok(true));
        assert_eq!(acl.set_parent(dataset(1)), Ok(false));
        assert_eq!(
            acl.set_parent(dataset(3)),
            Err(AclError::ParentAlreadySet {
                identity: dataset(2),
                existing: dataset(1),
                candidate: dataset(3),
            })
        );
        assert_eq!(acl.set_parent(dataset(2)), Err(AclError::SelfParent(dataset(2))));

        acl.reparent(Some(dataset(3))).unwrap();
        assert_eq!(acl.parent(), Some(dataset(3)));
    }

    #[test]
    fn same_entries_ignores_order_and_granting() {
        let mut a = Acl::new(dataset(1), Sid::principal("alice"));
        a.push_ace(Ace::grant(Permission::Read, Sid::principal("alice")));
        a.push_ace(Ace::grant(Permission::Write, Sid::principal("alice")));

        let other = vec![
            Ace::grant(Permission::Write, Sid::principal("alice")),
            Ace::deny(Permission::Read, Sid::principal("alice")),
        ];
        assert!(a.has_same_entries(&other));
        assert!(!a.has_same_entries(&other[..1]));
    }

    #[test]
    fn remove_aces() {
        let mut acl = Acl::new(dataset(1), Sid::principal("alice"));
        acl.push_ace(Ace::grant(Permission::Read, Sid::authority("ANON")));
        acl.push_ace(Ace::grant(Permission::Read, Sid::principal("alice")));

        assert!(acl.remove_aces(Permission::Read, &Sid::authority("ANON")));
        assert!(!acl.remove_aces(Permission::Read, &Sid::authority("ANON")));
        assert!(acl.grants(Permission::Read, &Sid::principal("alice")));
        assert_eq!(acl.entries().len(), 1);
    }
}
