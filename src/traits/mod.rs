// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces of the collaborators the synchronizer depends on.
mod acl_store;
mod cascade;
mod entity;
mod sid_resolver;

pub use acl_store::{AclStore, StoreError};
pub use cascade::{Action, AssociatedValue, Association, CascadeClassifier, Collection};
pub use entity::{Entity, EntityRef};
pub use sid_resolver::SidResolver;
