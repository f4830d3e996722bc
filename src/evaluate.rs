// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission evaluation along the inheritance chain.
use std::collections::HashSet;

use crate::acl::Acl;
use crate::identity::{ObjectIdentity, Sid};
use crate::permission::PermissionMask;
use crate::traits::{AclStore, StoreError};

/// Returns `true` if any of `sids` is granted any of `permissions` on `acl`.
///
/// Entries are scanned in order and the first one matching a requested permission and one of
/// the sids decides. Without a match, inheriting ACLs defer to their parent.
pub fn is_granted<S>(
    store: &S,
    acl: &Acl,
    permissions: PermissionMask,
    sids: &[Sid],
) -> Result<bool, StoreError>
where
    S: AclStore + ?Sized,
{
    let mut visited: HashSet<ObjectIdentity> = HashSet::new();
    let mut current = acl.clone();

    loop {
        if !visited.insert(current.identity()) {
            return Ok(false);
        }

        let decision = current
            .entries()
            .iter()
            .find(|ace| permissions.contains(ace.permission) && sids.contains(&ace.sid));
        if let Some(ace) = decision {
            return Ok(ace.granting);
        }

        if !current.is_entries_inheriting() {
            return Ok(false);
        }

        let Some(parent) = current.parent() else {
            return Ok(false);
        };

        current = store.read(&parent)?.ok_or(StoreError::NotFound(parent))?;
    }
}

/// The closest ACL in the chain starting at `acl` which has entries.
///
/// Returns `None` when no ACL in the chain has entries, which means nothing can be resolved for
/// the object.
pub fn resolve_entries<S>(store: &S, acl: &Acl) -> Result<Option<Acl>, StoreError>
where
    S: AclStore + ?Sized,
{
    let mut visited: HashSet<ObjectIdentity> = HashSet::new();
    let mut current = acl.clone();

    loop {
        if !visited.insert(current.identity()) {
            return Ok(None);
        }

        if !current.entries().is_empty() {
            return Ok(Some(current));
        }

        let Some(parent) = current.parent() else {
            return Ok(None);
        };

        match store.read(&parent)? {
            Some(parent_acl) => current = parent_acl,
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::acl::Ace;
    use crate::identity::{ObjectIdentity, Sid};
    use crate::permission::{Permission, PermissionMask};
    use crate::store::MemoryAclStore;
    use crate::traits::AclStore;

    use super::{is_granted, resolve_entries};

    fn setup() -> (MemoryAclStore, ObjectIdentity, ObjectIdentity) {
        let store = MemoryAclStore::new();
        let dataset = ObjectIdentity::new("dataset", 1);
        let assay = ObjectIdentity::new("assay", 1);

        let mut acl = store.create(dataset, Sid::principal("alice")).unwrap();
        acl.push_ace(Ace::grant(Permission::Write, Sid::principal("alice")));
        acl.push_ace(Ace::grant(Permission::Read, Sid::principal("alice")));
        store.update(&mut acl).unwrap();

        let mut child = store.create(assay, Sid::principal("alice")).unwrap();
        child.set_parent(dataset).unwrap();
        child.set_entries_inheriting(true);
        store.update(&mut child).unwrap();

        (store, dataset, assay)
    }

    #[test]
    fn inherited_grants() {
        let (store, _, assay) = setup();
        let child = store.read(&assay).unwrap().unwrap();

        let alice = [Sid::principal("alice")];
        let bob = [Sid::principal("bob")];
        assert!(is_granted(&store, &child, Permission::Read.into(), &alice).unwrap());
        assert!(is_granted(&store, &child, Permission::Read | Permission::Audit, &alice).unwrap());
        assert!(!is_granted(&store, &child, Permission::Read.into(), &bob).unwrap());
        assert!(
            !is_granted(&store, &child, PermissionMask::empty(), &alice).unwrap()
        );
    }

    #[test]
    fn first_matching_entry_decides() {
        let (store, _, assay) = setup();
        let mut child = store.read(&assay).unwrap().unwrap();
        child.push_ace(Ace::deny(Permission::Write, Sid::principal("alice")));
        store.update(&mut child).unwrap();

        let alice = [Sid::principal("alice")];
        assert!(!is_granted(&store, &child, Permission::Write.into(), &alice).unwrap());
        assert!(is_granted(&store, &child, Permission::Read.into(), &alice).unwrap());

        child.set_entries_inheriting(false);
        assert!(!is_granted(&store, &child, Permission::Read.into(), &alice).unwrap());
    }

    #[test]
    fn resolve_entries_from_parent() {
        let (store, dataset, assay) = setup();
        let child = store.read(&assay).unwrap().unwrap();

        let resolved = resolve_entries(&store, &child).unwrap().unwrap();
        assert_eq!(resolved.identity(), dataset);

        let lonely = store
            .create(ObjectIdentity::new("assay", 2), Sid::principal("alice"))
            .unwrap();
        assert_eq!(resolve_entries(&store, &lonely).unwrap(), None);
    }
}
