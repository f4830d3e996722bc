// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identities of securable objects and of the actors holding permissions on them.
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::traits::Entity;

/// Stable identity of a securable object, independent of any in-memory instance.
///
/// An identity is the pair of the object's registered type tag and its persisted key. It can
/// only be derived from an entity which already carries a key, see [`ObjectIdentity::of`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ObjectIdentity {
    kind: &'static str,
    key: u64,
}

impl ObjectIdentity {
    pub fn new(kind: &'static str, key: u64) -> Self {
        Self { kind, key }
    }

    /// Identity of a persisted entity.
    ///
    /// Returns `None` when the entity was not persisted yet and therefore lacks a key.
    pub fn of(entity: &dyn Entity) -> Option<Self> {
        entity.key().map(|key| Self::new(entity.type_tag(), key))
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn key(&self) -> u64 {
        self.key
    }
}

impl Display for ObjectIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.key)
    }
}

/// Security identity: someone or something permissions can be granted to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Sid {
    /// A single authenticated caller, identified by user name.
    Principal(String),

    /// A named group or role.
    Authority(String),
}

impl Sid {
    pub fn principal(name: impl Into<String>) -> Self {
        Self::Principal(name.into())
    }

    pub fn authority(name: impl Into<String>) -> Self {
        Self::Authority(name.into())
    }

    pub fn is_principal(&self) -> bool {
        matches!(self, Sid::Principal(_))
    }

    pub fn is_authority(&self) -> bool {
        matches!(self, Sid::Authority(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Sid::Principal(name) | Sid::Authority(name) => name,
        }
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sid::Principal(name) => write!(f, "principal:{name}"),
            Sid::Authority(name) => write!(f, "authority:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::Node;

    use super::{ObjectIdentity, Sid};

    #[test]
    fn identity_requires_key() {
        let transient = Node::transient("dataset");
        assert_eq!(ObjectIdentity::of(&*transient), None);

        let persisted = Node::new("dataset", 7);
        assert_eq!(
            ObjectIdentity::of(&*persisted),
            Some(ObjectIdentity::new("dataset", 7))
        );
    }

    #[test]
    fn sids_compare_by_kind_and_name() {
        assert_eq!(Sid::principal("alice"), Sid::principal("alice"));
        assert_ne!(Sid::principal("alice"), Sid::authority("alice"));
        assert_eq!(Sid::authority("GROUP_ADMIN").name(), "GROUP_ADMIN");
        assert_eq!(
            ObjectIdentity::new("dataset", 1).to_string(),
            "dataset#1".to_string()
        );
    }
}
