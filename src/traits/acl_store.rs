// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use crate::acl::Acl;
use crate::identity::{ObjectIdentity, Sid};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no acl found for {0}")]
    NotFound(ObjectIdentity),

    #[error("acl for {0} already exists")]
    AlreadyExists(ObjectIdentity),

    #[error("acl for {identity} was modified concurrently: expected version {expected}, found {found}")]
    Stale {
        identity: ObjectIdentity,
        expected: u64,
        found: u64,
    },

    #[error("error occurred in acl store: {0}")]
    Backend(String),
}

/// Persistence of access control lists, one per object identity.
///
/// Implementations must serialize writes per object identity: [`AclStore::update`] rejects an
/// ACL whose version does not match the stored one with [`StoreError::Stale`], so two
/// read-modify-write cycles on the same ACL can not silently overwrite each other.
pub trait AclStore {
    /// Persist a new ACL in one step, entries and parent included.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the object has an ACL already and with
    /// [`StoreError::NotFound`] if the parent has none. Returns the stored ACL with its initial
    /// version.
    fn insert(&self, acl: Acl) -> Result<Acl, StoreError>;

    /// Create and persist an empty ACL owned by `owner`.
    fn create(&self, identity: ObjectIdentity, owner: Sid) -> Result<Acl, StoreError> {
        self.insert(Acl::new(identity, owner))
    }

    /// Read an ACL, `None` when the object has none.
    fn read(&self, identity: &ObjectIdentity) -> Result<Option<Acl>, StoreError>;

    /// Persist changes to an ACL. On success the version of `acl` is advanced.
    fn update(&self, acl: &mut Acl) -> Result<(), StoreError>;

    /// Delete an ACL, with `cascade` also all ACLs which have it as (transitive) parent.
    ///
    /// Returns `false` when there was no ACL to delete.
    fn delete(&self, identity: &ObjectIdentity, cascade: bool) -> Result<bool, StoreError>;

    /// Identities of all ACLs naming `parent` as their direct parent.
    fn find_children(&self, parent: &ObjectIdentity) -> Result<Vec<ObjectIdentity>, StoreError>;

    /// Identities of all stored ACLs.
    fn identities(&self) -> Result<Vec<ObjectIdentity>, StoreError>;
}
