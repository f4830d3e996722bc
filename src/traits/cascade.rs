// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::traits::{Entity, EntityRef};

/// Lifecycle event an entity went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };

        write!(f, "{}", s)
    }
}

/// Contents of a collection-valued association.
#[derive(Clone, Debug)]
pub enum Collection {
    /// The collection is loaded and has no elements.
    Empty,

    /// The collection is loaded and has elements.
    Loaded(Vec<EntityRef>),

    /// The collection was never loaded. The owning entity was reached only transitively so its
    /// elements have been synchronized by an earlier pass.
    NotMaterialized,
}

impl Collection {
    /// Build a loaded collection, `Empty` when there are no elements.
    pub fn loaded(elements: Vec<EntityRef>) -> Self {
        if elements.is_empty() {
            Collection::Empty
        } else {
            Collection::Loaded(elements)
        }
    }
}

/// Value of an association at the time of classification.
#[derive(Clone, Debug)]
pub enum AssociatedValue {
    Single(Option<EntityRef>),
    Many(Collection),
}

/// One association of an entity, as reported by a [`CascadeClassifier`].
#[derive(Clone, Debug)]
pub struct Association {
    pub property: &'static str,
    pub value: AssociatedValue,
    pub cascade: bool,
}

/// Persistence-layer knowledge about which associations an action cascades over.
pub trait CascadeClassifier {
    /// Enumerate the associations of `entity` and whether `action` cascades to their targets.
    ///
    /// Returns `None` when there is no metadata for the entity's type.
    fn cascade_targets(&self, entity: &dyn Entity, action: Action) -> Option<Vec<Association>>;
}
