// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for access control lists.
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::DfsPostOrder;
use tracing::trace;

use crate::acl::Acl;
use crate::identity::ObjectIdentity;
use crate::traits::{AclStore, StoreError};

/// ACLs and the parent relation between them.
///
/// The graph holds one node per stored ACL and an edge from every parent to each of its
/// children.
#[derive(Clone, Debug, Default)]
pub struct InnerMemoryAclStore {
    acls: HashMap<ObjectIdentity, Acl>,
    graph: DiGraphMap<ObjectIdentity, ()>,
}

impl InnerMemoryAclStore {
    fn link_parent(&mut self, acl: &Acl) {
        let identity = acl.identity();
        let parents: Vec<_> = self
            .graph
            .neighbors_directed(identity, petgraph::Direction::Incoming)
            .collect();
        for parent in parents {
            if Some(parent) != acl.parent() {
                self.graph.remove_edge(parent, identity);
            }
        }

        if let Some(parent) = acl.parent() {
            self.graph.add_edge(parent, identity, ());
        }
    }

    /// Identities of `root` and all its transitive children, children first.
    fn descendants(&self, root: ObjectIdentity) -> Vec<ObjectIdentity> {
        let mut dfs = DfsPostOrder::new(&self.graph, root);
        let mut result = Vec::new();
        while let Some(node) = dfs.next(&self.graph) {
            result.push(node);
        }
        result
    }

    fn remove(&mut self, identity: ObjectIdentity) {
        self.acls.remove(&identity);
        self.graph.remove_node(identity);
    }
}

/// An in-memory [`AclStore`].
///
/// `MemoryAclStore` supports usage in multi-threaded contexts by wrapping an
/// `InnerMemoryAclStore` with an `RwLock` and `Arc`. Every ACL carries a version which is
/// advanced on each update; updates based on an outdated version are rejected.
#[derive(Clone, Debug, Default)]
pub struct MemoryAclStore {
    inner: Arc<RwLock<InnerMemoryAclStore>>,
}

impl MemoryAclStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_store(&self) -> Result<RwLockReadGuard<'_, InnerMemoryAclStore>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("acl store lock poisoned".to_string()))
    }

    fn write_store(&self) -> Result<RwLockWriteGuard<'_, InnerMemoryAclStore>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("acl store lock poisoned".to_string()))
    }

    /// Number of stored ACLs.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read_store()?.acls.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Copy of all stored ACLs, ordered by identity.
    pub fn snapshot(&self) -> Result<Vec<Acl>, StoreError> {
        let store = self.read_store()?;
        let mut acls: Vec<Acl> = store.acls.values().cloned().collect();
        acls.sort_by_key(|acl| acl.identity());
        Ok(acls)
    }
}

impl AclStore for MemoryAclStore {
    fn insert(&self, mut acl: Acl) -> Result<Acl, StoreError> {
        let mut store = self.write_store()?;
        let identity = acl.identity();
        if store.acls.contains_key(&identity) {
            return Err(StoreError::AlreadyExists(identity));
        }

        if let Some(parent) = acl.parent() {
            if !store.acls.contains_key(&parent) {
                return Err(StoreError::NotFound(parent));
            }
        }

        acl.set_version(1);
        store.graph.add_node(identity);
        store.link_parent(&acl);
        store.acls.insert(identity, acl.clone());
        trace!(%identity, parent = ?acl.parent(), "inserted acl");

        Ok(acl)
    }

    fn read(&self, identity: &ObjectIdentity) -> Result<Option<Acl>, StoreError> {
        Ok(self.read_store()?.acls.get(identity).cloned())
    }

    fn update(&self, acl: &mut Acl) -> Result<(), StoreError> {
        let mut store = self.write_store()?;
        let identity = acl.identity();

        let Some(stored) = store.acls.get(&identity) else {
            return Err(StoreError::NotFound(identity));
        };

        if stored.version() != acl.version() {
            return Err(StoreError::Stale {
                identity,
                expected: acl.version(),
                found: stored.version(),
            });
        }

        if let Some(parent) = acl.parent() {
            if !store.acls.contains_key(&parent) {
                return Err(StoreError::NotFound(parent));
            }
        }

        acl.set_version(acl.version() + 1);
        store.link_parent(acl);
        store.acls.insert(identity, acl.clone());
        trace!(%identity, version = acl.version(), "updated acl");

        Ok(())
    }

    fn delete(&self, identity: &ObjectIdentity, cascade: bool) -> Result<bool, StoreError> {
        let mut store = self.write_store()?;
        if !store.acls.contains_key(identity) {
            return Ok(false);
        }

        if cascade {
            for descendant in store.descendants(*identity) {
                store.remove(descendant);
                trace!(identity = %descendant, "deleted acl");
            }
        } else {
            let children: Vec<_> = store.graph.neighbors(*identity).collect();
            for child in children {
                if let Some(child_acl) = store.acls.get_mut(&child) {
                    child_acl.reparent(None).map_err(|err| StoreError::Backend(err.to_string()))?;
                    child_acl.set_version(child_acl.version() + 1);
                }
            }
            store.remove(*identity);
            trace!(%identity, "deleted acl");
        }

        Ok(true)
    }

    fn find_children(&self, parent: &ObjectIdentity) -> Result<Vec<ObjectIdentity>, StoreError> {
        let store = self.read_store()?;
        if !store.acls.contains_key(parent) {
            return Err(StoreError::NotFound(*parent));
        }

        let mut children: Vec<_> = store.graph.neighbors(*parent).collect();
        children.sort();
        Ok(children)
    }

    fn identities(&self) -> Result<Vec<ObjectIdentity>, StoreError> {
        let store = self.read_store()?;
        let mut identities: Vec<_> = store.acls.keys().copied().collect();
        identities.sort();
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use crate::acl::{Ace, Acl};
    use crate::identity::{ObjectIdentity, Sid};
    use crate::permission::Permission;
    use crate::traits::{AclStore, StoreError};

    use super::MemoryAclStore;

    fn oid(kind: &'static str, key: u64) -> ObjectIdentity {
        ObjectIdentity::new(kind, key)
    }

    fn create_child(store: &MemoryAclStore, child: ObjectIdentity, parent: ObjectIdentity) {
        let mut acl = store.create(child, Sid::principal("alice")).unwrap();
        acl.set_parent(parent).unwrap();
        acl.set_entries_inheriting(true);
        store.update(&mut acl).unwrap();
    }

    #[test]
    fn create_read_update() {
        let store = MemoryAclStore::new();
        let dataset = oid("dataset", 1);

        let mut acl = store.create(dataset, Sid::principal("alice")).unwrap();
        assert_eq!(
            store.create(dataset, Sid::principal("bob")),
            Err(StoreError::AlreadyExists(dataset))
        );

        acl.push_ace(Ace::grant(Permission::Read, Sid::principal("alice")));
        store.update(&mut acl).unwrap();
        assert_eq!(acl.version(), 2);

        let stored = store.read(&dataset).unwrap().unwrap();
        assert_eq!(stored, acl);
        assert_eq!(store.read(&oid("dataset", 2)).unwrap(), None);
    }

    #[test]
    fn reject_lost_update() {
        let store = MemoryAclStore::new();
        let dataset = oid("dataset", 1);
        store.create(dataset, Sid::principal("alice")).unwrap();

        let mut first = store.read(&dataset).unwrap().unwrap();
        let mut second = store.read(&dataset).unwrap().unwrap();

        first.push_ace(Ace::grant(Permission::Read, Sid::principal("alice")));
        store.update(&mut first).unwrap();

        second.push_ace(Ace::grant(Permission::Write, Sid::principal("bob")));
        assert_eq!(
            store.update(&mut second),
            Err(StoreError::Stale {
                identity: dataset,
                expected: 1,
                found: 2,
            })
        );
        assert_eq!(store.read(&dataset).unwrap().unwrap().entries().len(), 1);
    }

    #[test]
    fn insert_complete_acl() {
        let store = MemoryAclStore::new();
        let dataset = oid("dataset", 1);
        let assay = oid("assay", 1);

        let mut acl = Acl::new(assay, Sid::principal("alice"));
        acl.set_parent(dataset).unwrap();
        acl.set_entries_inheriting(true);

        // Nothing is stored while the parent is missing.
        assert_eq!(
            store.insert(acl.clone()),
            Err(StoreError::NotFound(dataset))
        );
        assert_eq!(store.read(&assay).unwrap(), None);

        store.create(dataset, Sid::principal("alice")).unwrap();
        let stored = store.insert(acl).unwrap();
        assert_eq!(stored.version(), 1);
        assert_eq!(stored.parent(), Some(dataset));
        assert_eq!(store.read(&assay).unwrap(), Some(stored));
        assert_eq!(store.find_children(&dataset).unwrap(), vec![assay]);

        assert_eq!(
            store.insert(Acl::new(assay, Sid::principal("bob"))),
            Err(StoreError::AlreadyExists(assay))
        );
    }

    #[test]
    fn parent_must_exist() {
        let store = MemoryAclStore::new();
        let mut acl = store.create(oid("assay", 1), Sid::principal("alice")).unwrap();
        acl.set_parent(oid("dataset", 1)).unwrap();
        assert_eq!(
            store.update(&mut acl),
            Err(StoreError::NotFound(oid("dataset", 1)))
        );
    }

    #[test]
    fn cascading_delete() {
        let store = MemoryAclStore::new();
        let dataset = oid("dataset", 1);
        let analysis = oid("analysis", 1);
        let result_set = oid("result_set", 1);
        let other = oid("dataset", 2);

        store.create(dataset, Sid::principal("alice")).unwrap();
        store.create(other, Sid::principal("alice")).unwrap();
        create_child(&store, analysis, dataset);
        create_child(&store, result_set, analysis);

        assert_eq!(store.find_children(&dataset).unwrap(), vec![analysis]);

        assert!(store.delete(&dataset, true).unwrap());
        assert_eq!(store.identities().unwrap(), vec![other]);
        assert!(!store.delete(&dataset, true).unwrap());
    }

    #[test]
    fn delete_without_cascade_detaches_children() {
        let store = MemoryAclStore::new();
        let dataset = oid("dataset", 1);
        let assay = oid("assay", 1);

        store.create(dataset, Sid::principal("alice")).unwrap();
        create_child(&store, assay, dataset);

        assert!(store.delete(&dataset, false).unwrap());
        let orphan = store.read(&assay).unwrap().unwrap();
        assert_eq!(orphan.parent(), None);
        assert_eq!(store.len().unwrap(), 1);
    }
}
