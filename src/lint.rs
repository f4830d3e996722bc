// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consistency checks over stored ACLs.
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::Serialize;
use tracing::{debug, warn};

use crate::evaluate::resolve_entries;
use crate::identity::ObjectIdentity;
use crate::registry::{Role, TypeRegistry};
use crate::traits::{AclStore, StoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum LintProblem {
    /// Neither the ACL nor any ACL it inherits from has entries.
    NoResolvableEntries,

    /// The type must always inherit, but the ACL has no parent.
    ChildWithoutParent,

    /// The type never inherits, but the ACL has a parent.
    NotChildWithParent,

    /// The parent has no ACL.
    DanglingParent(ObjectIdentity),

    /// The type is not registered as securable.
    UnknownType,
}

impl Display for LintProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LintProblem::NoResolvableEntries => write!(f, "no resolvable entries"),
            LintProblem::ChildWithoutParent => write!(f, "child without parent"),
            LintProblem::NotChildWithParent => write!(f, "not a child but has a parent"),
            LintProblem::DanglingParent(parent) => write!(f, "parent {parent} has no acl"),
            LintProblem::UnknownType => write!(f, "unknown type"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LintResult {
    pub identity: ObjectIdentity,
    pub problem: LintProblem,
}

/// Reports ACLs which violate the invariants the synchronizer maintains. Nothing is repaired,
/// running a synchronization pass over the affected objects is the fix.
#[derive(Clone, Debug)]
pub struct AclLinter<S> {
    store: S,
    registry: TypeRegistry,
}

impl<S> AclLinter<S>
where
    S: AclStore,
{
    pub fn new(store: S, registry: TypeRegistry) -> Self {
        Self { store, registry }
    }

    /// Check every stored ACL.
    pub fn lint(&self) -> Result<Vec<LintResult>, StoreError> {
        let mut results = Vec::new();
        let identities = self.store.identities()?;
        for identity in &identities {
            results.extend(self.lint_one(identity)?);
        }

        debug!(
            checked = identities.len(),
            problems = results.len(),
            "linted acls"
        );
        Ok(results)
    }

    /// Check the ACL of one object. An object without ACL has no problems.
    pub fn lint_one(&self, identity: &ObjectIdentity) -> Result<Vec<LintResult>, StoreError> {
        let Some(acl) = self.store.read(identity)? else {
            return Ok(Vec::new());
        };

        let mut problems = Vec::new();

        match self.registry.get(identity.kind()) {
            None => problems.push(LintProblem::UnknownType),
            Some(securable) => {
                if securable.role == Role::ChildOnly && acl.parent().is_none() {
                    problems.push(LintProblem::ChildWithoutParent);
                }

                if !securable.may_inherit() && acl.parent().is_some() {
                    problems.push(LintProblem::NotChildWithParent);
                }
            }
        }

        if let Some(parent) = acl.parent() {
            if self.store.read(&parent)?.is_none() {
                problems.push(LintProblem::DanglingParent(parent));
            }
        }

        if resolve_entries(&self.store, &acl)?.is_none() {
            problems.push(LintProblem::NoResolvableEntries);
        }

        Ok(problems
            .into_iter()
            .map(|problem| {
                warn!(%identity, %problem, "acl problem");
                LintResult {
                    identity: *identity,
                    problem,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::acl::Ace;
    use crate::identity::{ObjectIdentity, Sid};
    use crate::permission::Permission;
    use crate::store::MemoryAclStore;
    use crate::test_utils::{HidingStore, Node, alice, research_registry, synchronizer};
    use crate::traits::{AclStore, Action, EntityRef};

    use super::{AclLinter, LintProblem, LintResult};

    #[test]
    fn synchronized_graph_is_clean() {
        let sync = synchronizer();
        let dataset = Node::new("dataset", 1);
        let assay = Node::new("assay", 1);
        assay.push("samples", Node::new("sample", 1));
        dataset.push("assays", assay);

        let root: EntityRef = dataset;
        sync.synchronize(&alice(), &root, Action::Create, None)
            .unwrap();

        let linter = AclLinter::new(sync.store().clone(), research_registry());
        assert_eq!(linter.lint().unwrap(), vec![]);
    }

    #[test]
    fn report_problems() {
        let store = MemoryAclStore::new();
        let owner = Sid::principal("alice");

        let orphan = ObjectIdentity::new("assay", 1);
        store.create(orphan, owner.clone()).unwrap();

        let dataset = ObjectIdentity::new("dataset", 1);
        let mut acl = store.create(dataset, owner.clone()).unwrap();
        acl.push_ace(Ace::grant(Permission::Read, owner.clone()));
        store.update(&mut acl).unwrap();

        let nested = ObjectIdentity::new("dataset", 2);
        let mut acl = store.create(nested, owner.clone()).unwrap();
        acl.set_parent(dataset).unwrap();
        store.update(&mut acl).unwrap();

        let unknown = ObjectIdentity::new("measurement", 1);
        let mut acl = store.create(unknown, owner.clone()).unwrap();
        acl.push_ace(Ace::grant(Permission::Read, owner));
        store.update(&mut acl).unwrap();

        let linter = AclLinter::new(store, research_registry());
        let results = linter.lint().unwrap();

        assert_eq!(
            results,
            vec![
                LintResult {
                    identity: orphan,
                    problem: LintProblem::ChildWithoutParent,
                },
                LintResult {
                    identity: orphan,
                    problem: LintProblem::NoResolvableEntries,
                },
                LintResult {
                    identity: nested,
                    problem: LintProblem::NotChildWithParent,
                },
                LintResult {
                    identity: unknown,
                    problem: LintProblem::UnknownType,
                },
            ]
        );
    }

    #[test]
    fn dangling_parent() {
        let store = MemoryAclStore::new();
        let owner = Sid::principal("alice");
        let dataset = ObjectIdentity::new("dataset", 1);
        let assay = ObjectIdentity::new("assay", 1);

        let mut acl = store.create(dataset, owner.clone()).unwrap();
        acl.push_ace(Ace::grant(Permission::Read, owner.clone()));
        store.update(&mut acl).unwrap();

        let mut acl = store.create(assay, owner).unwrap();
        acl.set_parent(dataset).unwrap();
        acl.set_entries_inheriting(true);
        store.update(&mut acl).unwrap();

        let linter = AclLinter::new(
            HidingStore {
                inner: store,
                hidden: dataset,
            },
            research_registry(),
        );
        assert_eq!(
            linter.lint_one(&assay).unwrap(),
            vec![
                LintResult {
                    identity: assay,
                    problem: LintProblem::DanglingParent(dataset),
                },
                LintResult {
                    identity: assay,
                    problem: LintProblem::NoResolvableEntries,
                },
            ]
        );
        assert_eq!(linter.lint_one(&dataset).unwrap(), vec![]);
    }
}
