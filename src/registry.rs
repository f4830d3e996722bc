// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-type classification of securable entities.
//!
//! The registry is filled once at startup. The synchronizer asks it how an entity takes part in
//! permission inheritance instead of inspecting entity instances. Types which are not registered
//! are not securable and never receive an ACL.
use std::collections::HashMap;

use crate::traits::Entity;

/// Position of a securable type in the inheritance hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Never the child of another securable. Anchors the permission scope of its associations
    /// even when no parent was supplied.
    RootCapable,

    /// Must always inherit from a parent. Finding one without a parent is tolerated, a later
    /// pass is expected to attach it.
    ChildOnly,

    /// Inherits when a parent is known, anchors its associations otherwise.
    Standard,
}

/// Types which need special treatment when their ACL is first created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Special {
    #[default]
    None,

    /// A user account. The account's own principal always receives READ and WRITE.
    UserAccount,

    /// A group of users.
    UserGroup,

    /// An analysis derived from a dataset. Always inherits from the dataset's ACL.
    DerivedAnalysis,
}

/// How one securable type takes part in ACL synchronization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SecurableType {
    pub role: Role,
    pub never_inherits: bool,
    pub special: Special,
}

impl SecurableType {
    fn with_role(role: Role) -> Self {
        Self {
            role,
            never_inherits: false,
            special: Special::None,
        }
    }

    pub fn root_capable() -> Self {
        Self::with_role(Role::RootCapable)
    }

    pub fn child_only() -> Self {
        Self::with_role(Role::ChildOnly)
    }

    pub fn standard() -> Self {
        Self::with_role(Role::Standard)
    }

    /// A user account, which never inherits.
    pub fn user_account() -> Self {
        Self {
            special: Special::UserAccount,
            never_inherits: true,
            ..Self::standard()
        }
    }

    /// A user group, which never inherits.
    pub fn user_group() -> Self {
        Self {
            special: Special::UserGroup,
            never_inherits: true,
            ..Self::standard()
        }
    }

    /// An analysis derived from a dataset.
    ///
    /// The role is standard so that an analysis synchronized on its own anchors the ACLs of its
    /// results, while its own ACL always inherits from the dataset.
    pub fn derived_analysis() -> Self {
        Self {
            special: Special::DerivedAnalysis,
            ..Self::standard()
        }
    }

    pub fn with_never_inherits(mut self) -> Self {
        self.never_inherits = true;
        self
    }

    /// Returns `true` if ACLs of this type may be attached to a parent.
    pub fn may_inherit(&self) -> bool {
        !self.never_inherits && self.role != Role::RootCapable
    }

    /// Returns `true` for users and groups, which are never made public.
    pub fn is_identity(&self) -> bool {
        matches!(self.special, Special::UserAccount | Special::UserGroup)
    }
}

/// Registration table from type tag to securable type.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<&'static str, SecurableType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a securable type, replacing an earlier registration of the same tag.
    pub fn register(mut self, type_tag: &'static str, securable: SecurableType) -> Self {
        self.types.insert(type_tag, securable);
        self
    }

    pub fn get(&self, type_tag: &str) -> Option<&SecurableType> {
        self.types.get(type_tag)
    }

    /// Classification of an entity, `None` if the entity is not securable.
    pub fn classify(&self, entity: &dyn Entity) -> Option<&SecurableType> {
        self.get(entity.type_tag())
    }

    pub fn is_securable(&self, entity: &dyn Entity) -> bool {
        self.classify(entity).is_some()
    }
}
