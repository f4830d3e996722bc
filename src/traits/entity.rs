// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// Shared handle to a domain object.
pub type EntityRef = Arc<dyn Entity>;

/// A domain object which might carry an access control list.
///
/// Whether an entity is securable, and in which role, is not decided by the entity itself but
/// by the [`TypeRegistry`](crate::registry::TypeRegistry) entry for its type tag.
pub trait Entity: Debug + Send + Sync {
    /// Tag identifying the type of this entity. Must be the same for all instances of a type.
    fn type_tag(&self) -> &'static str;

    /// Persisted key, `None` when the entity was not persisted yet.
    fn key(&self) -> Option<u64>;

    /// User name of the account this entity represents, for user-account entities.
    fn account_principal(&self) -> Option<&str> {
        None
    }

    /// The dataset a derived analysis was computed from.
    fn analyzed_dataset(&self) -> Option<EntityRef> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}
