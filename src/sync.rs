// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronization of ACLs with the graph of securable entities.
//!
//! A lifecycle event on an entity triggers one synchronization pass. The pass walks the entity
//! and, depth-first, every association the cascade classifier reports for the event. Each
//! securable entity reached gets an ACL (created on first sight), and ACLs created before their
//! parent was known get linked to it. Passes are idempotent: revisiting an entity never changes
//! entries which were set when its ACL was created, and nothing is written when nothing changed.
use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::acl::{Ace, Acl, AclError};
use crate::caller::Caller;
use crate::config::Config;
use crate::evaluate::resolve_entries;
use crate::identity::{ObjectIdentity, Sid};
use crate::permission::Permission;
use crate::registry::{Role, SecurableType, Special, TypeRegistry};
use crate::strategy::{AccessDenied, AuthorizationStrategy, ChangeKind};
use crate::traits::{
    AclStore, Action, AssociatedValue, CascadeClassifier, Collection, Entity, EntityRef,
    SidResolver, StoreError,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("entity of type {0} was not persisted yet and has no identity")]
    NotPersisted(&'static str),

    #[error("entities of type {0} are not securable")]
    NotSecurable(&'static str),

    #[error(transparent)]
    ParentConflict(#[from] AclError),

    #[error("acl of {0} has no entries anywhere in its inheritance chain")]
    NoResolvableEntries(ObjectIdentity),

    #[error("derived analysis {0} does not name the dataset it analyzes")]
    MissingAnalyzedDataset(ObjectIdentity),

    #[error("user account {0} does not name its principal")]
    MissingPrincipal(ObjectIdentity),

    #[error("parent acl {parent} of {identity} not found")]
    ParentNotFound {
        identity: ObjectIdentity,
        parent: ObjectIdentity,
    },

    #[error("acl of {0} was modified concurrently {1} times, giving up")]
    TooManyConflicts(ObjectIdentity, usize),

    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Chooses the parent ACL handed down to the associations of an entity.
///
/// Entities which can anchor a permission scope pass their own ACL down: root-capable ones
/// always, standard ones when they were not reached through a parent. Everything else passes on
/// the parent it inherited.
pub fn choose_parent_for_associations(
    securable: &SecurableType,
    inherited: Option<Acl>,
    own: &Acl,
) -> Option<Acl> {
    match securable.role {
        Role::RootCapable => Some(own.clone()),
        Role::Standard if inherited.is_none() => Some(own.clone()),
        Role::Standard | Role::ChildOnly => inherited,
    }
}

/// Keeps ACLs consistent with the entity graph.
#[derive(Debug)]
pub struct Synchronizer<S, C, R> {
    store: S,
    classifier: C,
    registry: TypeRegistry,
    strategy: AuthorizationStrategy<R>,
    config: Config,
}

impl<S, C, R> Synchronizer<S, C, R>
where
    S: AclStore,
    C: CascadeClassifier,
    R: SidResolver,
{
    pub fn new(store: S, classifier: C, resolver: R, registry: TypeRegistry, config: Config) -> Self {
        let strategy = AuthorizationStrategy::new(resolver, config.authorities.clone());
        Self {
            store,
            classifier,
            registry,
            strategy,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn strategy(&self) -> &AuthorizationStrategy<R> {
        &self.strategy
    }

    /// Synchronize the ACLs of `entity` and its cascaded associations after `action`.
    ///
    /// `parent_hint` overrides the parent the root entity would otherwise start with: none for
    /// creations, the currently recorded parent for updates.
    pub fn synchronize(
        &self,
        caller: &Caller,
        entity: &EntityRef,
        action: Action,
        parent_hint: Option<&Acl>,
    ) -> Result<(), SyncError> {
        if !self.registry.is_securable(entity.as_ref()) {
            return Err(SyncError::NotSecurable(entity.type_tag()));
        }
        let identity = identity_of(entity.as_ref())?;

        debug!(%identity, %action, "synchronize acls");

        match action {
            Action::Delete => self.delete(identity),
            Action::Create => self.traverse(caller, entity.clone(), action, parent_hint.cloned()),
            Action::Update => {
                // The true parent can not be derived again mid-update, the recorded one is the
                // best we know.
                let parent = match parent_hint {
                    Some(parent) => Some(parent.clone()),
                    None => self.recorded_parent(identity)?,
                };
                self.traverse(caller, entity.clone(), action, parent)
            }
        }
    }

    fn delete(&self, identity: ObjectIdentity) -> Result<(), SyncError> {
        if self.store.delete(&identity, true)? {
            debug!(%identity, "deleted acl and its descendants");
        } else {
            debug!(%identity, "no acl to delete");
        }
        Ok(())
    }

    fn recorded_parent(&self, identity: ObjectIdentity) -> Result<Option<Acl>, SyncError> {
        let Some(acl) = self.store.read(&identity)? else {
            return Ok(None);
        };

        let Some(parent) = acl.parent() else {
            return Ok(None);
        };

        match self.store.read(&parent)? {
            Some(parent_acl) => Ok(Some(parent_acl)),
            None => Err(SyncError::ParentNotFound { identity, parent }),
        }
    }

    /// Depth-first walk over the entity and its cascaded associations.
    fn traverse(
        &self,
        caller: &Caller,
        root: EntityRef,
        action: Action,
        parent: Option<Acl>,
    ) -> Result<(), SyncError> {
        let mut visited: HashSet<ObjectIdentity> = HashSet::new();
        let mut stack: Vec<(EntityRef, Option<Acl>)> = vec![(root, parent)];

        while let Some((entity, parent)) = stack.pop() {
            let Some(securable) = self.registry.classify(entity.as_ref()).copied() else {
                trace!(type_tag = entity.type_tag(), "skip entity which is not securable");
                continue;
            };

            let identity = identity_of(entity.as_ref())?;
            if !visited.insert(identity) {
                trace!(%identity, "already visited in this pass");
                continue;
            }

            let acl = self.ensure_acl(caller, &entity, &securable, parent.as_ref())?;
            let association_parent = choose_parent_for_associations(&securable, parent, &acl);

            let Some(associations) = self.classifier.cascade_targets(entity.as_ref(), action)
            else {
                warn!(%identity, "no cascade metadata, associations are not synchronized");
                continue;
            };

            let mut targets: Vec<EntityRef> = Vec::new();
            for association in associations {
                if !association.cascade {
                    continue;
                }

                match association.value {
                    AssociatedValue::Single(Some(target)) => targets.push(target),
                    AssociatedValue::Single(None) | AssociatedValue::Many(Collection::Empty) => {}
                    AssociatedValue::Many(Collection::Loaded(elements)) => targets.extend(elements),
                    AssociatedValue::Many(Collection::NotMaterialized) => {
                        debug!(
                            %identity,
                            property = association.property,
                            "collection not loaded, assuming it was synchronized before"
                        );
                    }
                }
            }

            // Reversed so that associations are visited in the order they were reported.
            for target in targets.into_iter().rev() {
                stack.push((target, association_parent.clone()));
            }
        }

        Ok(())
    }

    /// Return the ACL of `entity`, creating it if it does not exist yet.
    ///
    /// Existing ACLs only get their parent reconciled with `parent`, their entries are left
    /// alone. New ACLs are built completely before they are persisted, so a failure leaves no
    /// ACL behind.
    pub fn ensure_acl(
        &self,
        caller: &Caller,
        entity: &EntityRef,
        securable: &SecurableType,
        parent: Option<&Acl>,
    ) -> Result<Acl, SyncError> {
        let identity = identity_of(entity.as_ref())?;

        if let Some(existing) = self.store.read(&identity)? {
            return self.maybe_set_parent(caller, securable, existing, parent);
        }

        let acl = if securable.special == Special::DerivedAnalysis {
            self.new_derived_analysis_acl(caller, entity, identity)?
        } else {
            self.new_acl(caller, entity.as_ref(), securable, identity, parent)?
        };

        match self.store.insert(acl) {
            Ok(acl) => {
                debug!(
                    %identity,
                    owner = %acl.owner(),
                    parent = ?acl.parent(),
                    entries = acl.entries().len(),
                    "created acl"
                );
                Ok(acl)
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!(%identity, "acl created by a concurrent pass");
                let existing = self
                    .store
                    .read(&identity)?
                    .ok_or(StoreError::NotFound(identity))?;
                self.maybe_set_parent(caller, securable, existing, parent)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn new_acl(
        &self,
        caller: &Caller,
        entity: &dyn Entity,
        securable: &SecurableType,
        identity: ObjectIdentity,
        parent: Option<&Acl>,
    ) -> Result<Acl, SyncError> {
        let inherit = parent.is_some() && securable.may_inherit();
        let owner = self.owner_for(caller, entity, securable, identity)?;

        let mut acl = Acl::new(identity, owner);
        acl.set_entries_inheriting(inherit);

        if !inherit {
            if securable.role == Role::ChildOnly {
                debug!(%identity, "child without parent yet, expecting a later pass to link it");
            }
            self.add_baseline_entries(caller, securable, &mut acl);
        }

        if securable.special == Special::UserAccount {
            let principal = entity
                .account_principal()
                .ok_or(SyncError::MissingPrincipal(identity))?;
            let sid = Sid::principal(principal);
            for permission in [Permission::Read, Permission::Write] {
                if !acl.grants(permission, &sid) {
                    acl.insert_ace(0, Ace::grant(permission, sid.clone()));
                }
            }
        }

        if let Some(parent) = parent.filter(|_| inherit) {
            acl.set_parent(parent.identity())?;
        }

        Ok(acl)
    }

    fn owner_for(
        &self,
        caller: &Caller,
        entity: &dyn Entity,
        securable: &SecurableType,
        identity: ObjectIdentity,
    ) -> Result<Sid, SyncError> {
        // An account provisioning itself with elevated privileges owns its own ACL.
        if securable.special == Special::UserAccount && caller.is_elevated() {
            let principal = entity
                .account_principal()
                .ok_or(SyncError::MissingPrincipal(identity))?;
            return Ok(Sid::principal(principal));
        }

        Ok(caller.sid())
    }

    fn is_administrator(&self, caller: &Caller) -> bool {
        let administrator = self.config.authorities.administrator_sid();
        self.strategy
            .resolver()
            .reachable_identities(caller)
            .contains(&administrator)
    }

    /// Entries of an ACL which does not inherit. Entries are inserted at the front, so the ones
    /// added last take precedence.
    fn add_baseline_entries(&self, caller: &Caller, securable: &SecurableType, acl: &mut Acl) {
        let authorities = &self.config.authorities;
        acl.insert_ace(
            0,
            Ace::grant(Permission::Administration, authorities.administrator_sid()),
        );
        acl.insert_ace(0, Ace::grant(Permission::Read, authorities.agent_sid()));

        let administrator = self.is_administrator(caller);
        if administrator && !securable.is_identity() {
            acl.insert_ace(0, Ace::grant(Permission::Read, authorities.anonymous_sid()));
        }

        if !administrator && !caller.is_anonymous() {
            acl.insert_ace(0, Ace::grant(Permission::Read, caller.sid()));
            acl.insert_ace(0, Ace::grant(Permission::Write, caller.sid()));
        }
    }

    /// Derived analyses share the permissions of the dataset they analyze: the dataset's ACL
    /// becomes the parent and its owner the owner, whoever created the analysis.
    fn new_derived_analysis_acl(
        &self,
        caller: &Caller,
        entity: &EntityRef,
        identity: ObjectIdentity,
    ) -> Result<Acl, SyncError> {
        let dataset = entity
            .analyzed_dataset()
            .ok_or(SyncError::MissingAnalyzedDataset(identity))?;
        let dataset_identity = identity_of(dataset.as_ref())?;
        if dataset_identity == identity {
            return Err(SyncError::MissingAnalyzedDataset(identity));
        }

        let dataset_acl = match self.store.read(&dataset_identity)? {
            Some(acl) => acl,
            None => {
                let securable = self
                    .registry
                    .classify(dataset.as_ref())
                    .copied()
                    .ok_or(SyncError::NotSecurable(dataset.type_tag()))?;
                self.ensure_acl(caller, &dataset, &securable, None)?
            }
        };

        let mut acl = Acl::new(identity, dataset_acl.owner().clone());
        acl.set_entries_inheriting(true);
        acl.set_parent(dataset_identity)?;
        trace!(%identity, dataset = %dataset_identity, "derived analysis inherits from dataset");

        Ok(acl)
    }

    /// Reconcile the parent of an existing ACL with a candidate parent.
    pub fn maybe_set_parent(
        &self,
        caller: &Caller,
        securable: &SecurableType,
        acl: Acl,
        candidate: Option<&Acl>,
    ) -> Result<Acl, SyncError> {
        if !securable.may_inherit() {
            return Ok(acl);
        }

        // Derived analyses are bound to their dataset when their ACL is created.
        if securable.special == Special::DerivedAnalysis && acl.parent().is_some() {
            return Ok(acl);
        }

        let Some(candidate) = candidate else {
            if securable.role == Role::ChildOnly && acl.parent().is_none() {
                debug!(
                    identity = %acl.identity(),
                    "child without parent yet, expecting a later pass to link it"
                );
            }
            return Ok(acl);
        };

        if candidate.identity() == acl.identity() {
            return Ok(acl);
        }

        let identity = acl.identity();
        let mut acl = acl;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.reconcile_parent(caller, &mut acl, candidate.identity()) {
                Ok(()) => return Ok(acl),
                Err(SyncError::Store(StoreError::Stale { .. }))
                    if attempts < self.config.max_update_attempts =>
                {
                    debug!(%identity, attempts, "acl modified concurrently, retrying");
                    acl = self
                        .store
                        .read(&identity)?
                        .ok_or(StoreError::NotFound(identity))?;
                }
                Err(SyncError::Store(StoreError::Stale { .. })) => {
                    return Err(SyncError::TooManyConflicts(identity, attempts));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn reconcile_parent(
        &self,
        caller: &Caller,
        acl: &mut Acl,
        parent_identity: ObjectIdentity,
    ) -> Result<(), SyncError> {
        let identity = acl.identity();
        let parent = self
            .store
            .read(&parent_identity)?
            .ok_or(SyncError::ParentNotFound {
                identity,
                parent: parent_identity,
            })?;
        let before = acl.clone();
        let mut changed = false;

        if acl.set_parent(parent_identity)? {
            acl.set_entries_inheriting(true);
            changed = true;
            debug!(%identity, parent = %parent_identity, "attached parent");
        }

        // Entries duplicating the parent's are dropped so permissions resolve from the parent
        // alone. This also drops explicit grants which happen to be identical to the parent's.
        if acl.is_entries_inheriting()
            && !acl.entries().is_empty()
            && acl.has_same_entries(parent.entries())
        {
            acl.clear_entries();
            changed = true;
            debug!(%identity, parent = %parent_identity, "cleared entries duplicating parent");
        }

        if acl.entries().is_empty() && resolve_entries(&self.store, &parent)?.is_none() {
            return Err(SyncError::NoResolvableEntries(identity));
        }

        if changed {
            self.strategy
                .check_may_mutate(caller, &before, ChangeKind::General)?;
            self.store.update(acl)?;
        }

        Ok(())
    }
}

fn identity_of(entity: &dyn Entity) -> Result<ObjectIdentity, SyncError> {
    ObjectIdentity::of(entity).ok_or(SyncError::NotPersisted(entity.type_tag()))
}

#[cfg(test)]
mod tests {
    use crate::acl::Acl;
    use crate::identity::{ObjectIdentity, Sid};
    use crate::registry::SecurableType;

    use super::choose_parent_for_associations;

    fn acl(kind: &'static str) -> Acl {
        Acl::new(ObjectIdentity::new(kind, 1), Sid::principal("alice"))
    }

    #[test]
    fn root_capable_anchors_its_associations() {
        let own = acl("dataset");
        let inherited = acl("collection");
        let chosen =
            choose_parent_for_associations(&SecurableType::root_capable(), Some(inherited), &own);
        assert_eq!(chosen, Some(own));
    }

    #[test]
    fn standard_anchors_only_without_parent() {
        let own = acl("gene_set");
        let inherited = acl("dataset");

        let chosen = choose_parent_for_associations(&SecurableType::standard(), None, &own);
        assert_eq!(chosen, Some(own.clone()));

        let chosen = choose_parent_for_associations(
            &SecurableType::standard(),
            Some(inherited.clone()),
            &own,
        );
        assert_eq!(chosen, Some(inherited));
    }

    #[test]
    fn child_only_passes_parent_through() {
        let own = acl("assay");
        assert_eq!(
            choose_parent_for_associations(&SecurableType::child_only(), None, &own),
            None
        );

        let inherited = acl("dataset");
        assert_eq!(
            choose_parent_for_associations(
                &SecurableType::child_only(),
                Some(inherited.clone()),
                &own
            ),
            Some(inherited)
        );
    }
}
