// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keeps access control lists consistent with a mutable, possibly cyclic graph of securable
//! objects.
//!
//! Lifecycle events on domain entities are handed to a [`Synchronizer`]. It walks the entity's
//! associations as far as the persistence layer cascades the event, creates ACLs for securable
//! objects the first time it sees them and links each ACL to the ACL it inherits permissions
//! from. Passes are idempotent and safe to re-run after a partial failure.
//!
//! ```
//! use std::sync::Arc;
//!
//! use acl_sync::cascade::{AssociationRules, DescriptorClassifier};
//! use acl_sync::registry::{SecurableType, TypeRegistry};
//! use acl_sync::traits::{Action, Entity, EntityRef};
//! use acl_sync::{Caller, Config, DefaultSidResolver, MemoryAclStore, ObjectIdentity, Synchronizer};
//!
//! #[derive(Debug)]
//! struct Dataset(u64);
//!
//! impl Entity for Dataset {
//!     fn type_tag(&self) -> &'static str {
//!         "dataset"
//!     }
//!
//!     fn key(&self) -> Option<u64> {
//!         Some(self.0)
//!     }
//!
//!     fn as_any(&self) -> &dyn std::any::Any {
//!         self
//!     }
//! }
//!
//! let registry = TypeRegistry::new().register("dataset", SecurableType::root_capable());
//! let sync = Synchronizer::new(
//!     MemoryAclStore::new(),
//!     DescriptorClassifier::new(AssociationRules::default()),
//!     DefaultSidResolver::default(),
//!     registry,
//!     Config::default(),
//! );
//!
//! let alice = Caller::authenticated("alice", ["GROUP_USER"]);
//! let dataset: EntityRef = Arc::new(Dataset(1));
//! sync.synchronize(&alice, &dataset, Action::Create, None)?;
//!
//! use acl_sync::traits::AclStore;
//! let acl = sync.store().read(&ObjectIdentity::new("dataset", 1))?.unwrap();
//! assert_eq!(acl.entries().len(), 4);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod acl;
pub mod caller;
pub mod cascade;
pub mod config;
pub mod evaluate;
pub mod identity;
pub mod lint;
pub mod permission;
pub mod registry;
pub mod service;
pub mod sid;
pub mod store;
pub mod strategy;
pub mod sync;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;

pub use acl::{Ace, Acl, AclError};
pub use caller::Caller;
pub use config::{Authorities, Config};
pub use identity::{ObjectIdentity, Sid};
pub use lint::{AclLinter, LintProblem, LintResult};
pub use permission::{Permission, PermissionMask};
pub use service::{SecurityService, ServiceError};
pub use sid::DefaultSidResolver;
pub use store::MemoryAclStore;
pub use strategy::{AccessDenied, AuthorizationStrategy, ChangeKind};
pub use sync::{SyncError, Synchronizer};
