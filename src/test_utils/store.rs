// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stores simulating concurrent writers and inconsistent persistence.
use std::sync::Mutex;

use crate::acl::Acl;
use crate::identity::ObjectIdentity;
use crate::store::MemoryAclStore;
use crate::traits::{AclStore, StoreError};

/// Store which pretends one ACL does not exist.
#[derive(Debug)]
pub struct HidingStore {
    pub inner: MemoryAclStore,
    pub hidden: ObjectIdentity,
}

impl AclStore for HidingStore {
    fn insert(&self, acl: Acl) -> Result<Acl, StoreError> {
        self.inner.insert(acl)
    }

    fn read(&self, identity: &ObjectIdentity) -> Result<Option<Acl>, StoreError> {
        if identity == &self.hidden {
            return Ok(None);
        }
        self.inner.read(identity)
    }

    fn update(&self, acl: &mut Acl) -> Result<(), StoreError> {
        self.inner.update(acl)
    }

    fn delete(&self, identity: &ObjectIdentity, cascade: bool) -> Result<bool, StoreError> {
        self.inner.delete(identity, cascade)
    }

    fn find_children(&self, parent: &ObjectIdentity) -> Result<Vec<ObjectIdentity>, StoreError> {
        self.inner.find_children(parent)
    }

    fn identities(&self) -> Result<Vec<ObjectIdentity>, StoreError> {
        self.inner.identities()
    }
}

/// Store in which concurrent writers get in first.
///
/// Each of the next `races` updates of `target` is preceded by an update of the same ACL from
/// someone else. Inserting the ACL of `preempt` is preceded by the insertion of that ACL.
#[derive(Debug, Default)]
pub struct RacingStore {
    pub inner: MemoryAclStore,
    target: Option<ObjectIdentity>,
    races: Mutex<usize>,
    preempt: Mutex<Option<Acl>>,
}

impl RacingStore {
    pub fn new(inner: MemoryAclStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Lose the next `races` updates of `target`.
    pub fn race_updates(mut self, target: ObjectIdentity, races: usize) -> Self {
        self.target = Some(target);
        self.races = Mutex::new(races);
        self
    }

    /// Lose the insertion of the ACL with the identity of `concurrent`, which is stored instead.
    pub fn race_insert(self, concurrent: Acl) -> Self {
        Self {
            preempt: Mutex::new(Some(concurrent)),
            ..self
        }
    }
}

impl AclStore for RacingStore {
    fn insert(&self, acl: Acl) -> Result<Acl, StoreError> {
        let concurrent = self
            .preempt
            .lock()
            .unwrap()
            .take_if(|concurrent| concurrent.identity() == acl.identity());
        if let Some(concurrent) = concurrent {
            self.inner.insert(concurrent)?;
        }
        self.inner.insert(acl)
    }

    fn read(&self, identity: &ObjectIdentity) -> Result<Option<Acl>, StoreError> {
        self.inner.read(identity)
    }

    fn update(&self, acl: &mut Acl) -> Result<(), StoreError> {
        let mut races = self.races.lock().unwrap();
        if Some(acl.identity()) == self.target && *races > 0 {
            *races -= 1;
            if let Some(mut concurrent) = self.inner.read(&acl.identity())? {
                self.inner.update(&mut concurrent)?;
            }
        }
        self.inner.update(acl)
    }

    fn delete(&self, identity: &ObjectIdentity, cascade: bool) -> Result<bool, StoreError> {
        self.inner.delete(identity, cascade)
    }

    fn find_children(&self, parent: &ObjectIdentity) -> Result<Vec<ObjectIdentity>, StoreError> {
        self.inner.find_children(parent)
    }

    fn identities(&self) -> Result<Vec<ObjectIdentity>, StoreError> {
        self.inner.identities()
    }
}
