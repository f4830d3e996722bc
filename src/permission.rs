// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::ops::{BitOr, BitOrAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The capabilities which can be granted or denied on a securable object.
///
/// Each permission occupies one bit so they can be combined into a [`PermissionMask`]. The bit
/// values are stable and may be persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Permission {
    /// Permission to see an object.
    Read,

    /// Permission to change an object.
    Write,

    /// Permission to edit the access control list of an object or to transfer its ownership.
    Administration,

    /// Permission to change the auditing settings of an object.
    Audit,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Read,
        Permission::Write,
        Permission::Administration,
        Permission::Audit,
    ];

    pub fn mask(&self) -> u8 {
        match self {
            Permission::Read => 1 << 0,
            Permission::Write => 1 << 1,
            Permission::Administration => 1 << 4,
            Permission::Audit => 1 << 5,
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Administration => "administration",
            Permission::Audit => "audit",
        };

        write!(f, "{}", s)
    }
}

/// A set of permissions encoded as a bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PermissionMask(u8);

impl PermissionMask {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0 & permission.mask() != 0
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission.mask();
    }

    pub fn remove(&mut self, permission: Permission) {
        self.0 &= !permission.mask();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate over the permissions contained in this mask, lowest bit first.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL
            .into_iter()
            .filter(|permission| self.contains(*permission))
    }
}

impl From<Permission> for PermissionMask {
    fn from(permission: Permission) -> Self {
        Self(permission.mask())
    }
}

impl FromIterator<Permission> for PermissionMask {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        let mut mask = PermissionMask::empty();
        for permission in iter {
            mask.insert(permission);
        }
        mask
    }
}

impl BitOr for Permission {
    type Output = PermissionMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        PermissionMask(self.mask() | rhs.mask())
    }
}

impl BitOr<Permission> for PermissionMask {
    type Output = PermissionMask;

    fn bitor(self, rhs: Permission) -> Self::Output {
        PermissionMask(self.0 | rhs.mask())
    }
}

impl BitOrAssign<Permission> for PermissionMask {
    fn bitor_assign(&mut self, rhs: Permission) {
        self.insert(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::{Permission, PermissionMask};

    #[test]
    fn combine_permissions() {
        let mask = Permission::Read | Permission::Write;
        assert!(mask.contains(Permission::Read));
        assert!(mask.contains(Permission::Write));
        assert!(!mask.contains(Permission::Administration));
        assert_eq!(mask.bits(), 0b11);

        let mut mask = mask | Permission::Audit;
        mask.remove(Permission::Read);
        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            vec![Permission::Write, Permission::Audit]
        );
    }

    #[test]
    fn empty_mask() {
        let mut mask = PermissionMask::empty();
        assert!(mask.is_empty());
        mask |= Permission::Administration;
        assert_eq!(mask, PermissionMask::from(Permission::Administration));
        assert_eq!(mask.bits(), 16);
    }
}
