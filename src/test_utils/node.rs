// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use crate::traits::{AssociatedValue, Collection, Entity, EntityRef};

/// Generic test entity.
///
/// Associations are kept behind locks so they can be wired after construction, which allows
/// building cyclic graphs.
pub struct Node {
    type_tag: &'static str,
    key: Option<u64>,
    account_principal: Option<String>,
    analyzed_dataset: Option<EntityRef>,
    singles: RwLock<HashMap<&'static str, EntityRef>>,
    collections: RwLock<HashMap<&'static str, Collection>>,
}

impl Node {
    fn build(
        type_tag: &'static str,
        key: Option<u64>,
        account_principal: Option<String>,
        analyzed_dataset: Option<EntityRef>,
    ) -> Arc<Self> {
        Arc::new(Self {
            type_tag,
            key,
            account_principal,
            analyzed_dataset,
            singles: RwLock::new(HashMap::new()),
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// A persisted entity.
    pub fn new(type_tag: &'static str, key: u64) -> Arc<Self> {
        Self::build(type_tag, Some(key), None, None)
    }

    /// An entity which was not persisted yet.
    pub fn transient(type_tag: &'static str) -> Arc<Self> {
        Self::build(type_tag, None, None, None)
    }

    /// A persisted user account.
    pub fn user(key: u64, principal: &str) -> Arc<Self> {
        Self::build("user", Some(key), Some(principal.to_string()), None)
    }

    /// A persisted analysis of `dataset`.
    pub fn analysis(key: u64, dataset: EntityRef) -> Arc<Self> {
        Self::build("analysis", Some(key), None, Some(dataset))
    }

    /// Set a single-valued association.
    pub fn link(&self, property: &'static str, target: EntityRef) {
        self.singles.write().unwrap().insert(property, target);
    }

    /// Append to a collection-valued association.
    pub fn push(&self, property: &'static str, element: EntityRef) {
        let mut collections = self.collections.write().unwrap();
        let collection = collections.entry(property).or_insert(Collection::Empty);
        match collection {
            Collection::Loaded(elements) => elements.push(element),
            _ => *collection = Collection::Loaded(vec![element]),
        }
    }

    /// Replace a collection-valued association.
    pub fn set_many(&self, property: &'static str, collection: Collection) {
        self.collections
            .write()
            .unwrap()
            .insert(property, collection);
    }

    pub fn single(&self, property: &'static str) -> AssociatedValue {
        AssociatedValue::Single(self.singles.read().unwrap().get(property).cloned())
    }

    pub fn many(&self, property: &'static str) -> AssociatedValue {
        let collection = self
            .collections
            .read()
            .unwrap()
            .get(property)
            .cloned()
            .unwrap_or(Collection::Empty);
        AssociatedValue::Many(collection)
    }
}

impl Debug for Node {
    // Associations are left out as they may be cyclic.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("type_tag", &self.type_tag)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Entity for Node {
    fn type_tag(&self) -> &'static str {
        self.type_tag
    }

    fn key(&self) -> Option<u64> {
        self.key
    }

    fn account_principal(&self) -> Option<&str> {
        self.account_principal.as_deref()
    }

    fn analyzed_dataset(&self) -> Option<EntityRef> {
        self.analyzed_dataset.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
