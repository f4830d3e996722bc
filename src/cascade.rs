// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry-driven cascade classification.
//!
//! Every entity type describes its associations once, at startup, with a [`TypeDescriptor`]: the
//! property name, the actions which cascade over it and an accessor reading the current value.
//! [`AssociationRules`] then override the cascade metadata for individual type / property pairs:
//! some are never followed because walking them is expensive and never reaches new securables,
//! others are always followed because both ends are persisted in the same transaction without a
//! declared cascade.
use std::collections::HashMap;
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::traits::{Action, AssociatedValue, Association, CascadeClassifier, Entity};

/// A type tag and property name pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssociationRule {
    pub type_tag: String,
    pub property: String,
}

impl AssociationRule {
    pub fn new(type_tag: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            property: property.into(),
        }
    }

    fn matches(&self, type_tag: &str, property: &str) -> bool {
        self.type_tag == type_tag && self.property == property
    }
}

/// Static exceptions to the cascade metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssociationRules {
    /// Associations which are never traversed.
    pub skip: Vec<AssociationRule>,

    /// Associations which are always traversed, whatever the cascade metadata says.
    pub always_follow: Vec<AssociationRule>,
}

impl AssociationRules {
    pub fn skip(mut self, type_tag: &str, property: &str) -> Self {
        self.skip.push(AssociationRule::new(type_tag, property));
        self
    }

    pub fn always_follow(mut self, type_tag: &str, property: &str) -> Self {
        self.always_follow
            .push(AssociationRule::new(type_tag, property));
        self
    }

    pub fn is_skipped(&self, type_tag: &str, property: &str) -> bool {
        self.skip.iter().any(|rule| rule.matches(type_tag, property))
    }

    pub fn is_always_followed(&self, type_tag: &str, property: &str) -> bool {
        self.always_follow
            .iter()
            .any(|rule| rule.matches(type_tag, property))
    }
}

type Accessor = Box<dyn Fn(&dyn Entity) -> Option<AssociatedValue> + Send + Sync>;

struct AssociationDescriptor {
    property: &'static str,
    cascade_on: Vec<Action>,
    accessor: Accessor,
}

impl Debug for AssociationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssociationDescriptor")
            .field("property", &self.property)
            .field("cascade_on", &self.cascade_on)
            .finish_non_exhaustive()
    }
}

/// Associations of one entity type.
#[derive(Debug, Default)]
pub struct TypeDescriptor {
    associations: Vec<AssociationDescriptor>,
}

impl TypeDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe an association of entities of concrete type `T`.
    ///
    /// `cascade_on` lists the actions the persistence layer propagates over this association.
    pub fn association<T, F>(mut self, property: &'static str, cascade_on: &[Action], get: F) -> Self
    where
        T: Entity + 'static,
        F: Fn(&T) -> AssociatedValue + Send + Sync + 'static,
    {
        let accessor: Accessor =
            Box::new(move |entity| entity.as_any().downcast_ref::<T>().map(&get));
        self.associations.push(AssociationDescriptor {
            property,
            cascade_on: cascade_on.to_vec(),
            accessor,
        });
        self
    }
}

/// [`CascadeClassifier`] answering from registered type descriptors and association rules.
#[derive(Debug, Default)]
pub struct DescriptorClassifier {
    descriptors: HashMap<&'static str, TypeDescriptor>,
    rules: AssociationRules,
}

impl DescriptorClassifier {
    pub fn new(rules: AssociationRules) -> Self {
        Self {
            descriptors: HashMap::new(),
            rules,
        }
    }

    /// Register the associations of a type.
    pub fn describe(mut self, type_tag: &'static str, descriptor: TypeDescriptor) -> Self {
        self.descriptors.insert(type_tag, descriptor);
        self
    }

    pub fn rules(&self) -> &AssociationRules {
        &self.rules
    }
}

impl CascadeClassifier for DescriptorClassifier {
    fn cascade_targets(&self, entity: &dyn Entity, action: Action) -> Option<Vec<Association>> {
        let type_tag = entity.type_tag();
        let descriptor = self.descriptors.get(type_tag)?;

        let associations = descriptor
            .associations
            .iter()
            .filter_map(|association| {
                if self.rules.is_skipped(type_tag, association.property) {
                    trace!(type_tag, property = association.property, "skip association");
                    return None;
                }

                let Some(value) = (association.accessor)(entity) else {
                    warn!(
                        type_tag,
                        property = association.property,
                        "association described for a different concrete type"
                    );
                    return None;
                };

                let cascade = association.cascade_on.contains(&action)
                    || self.rules.is_always_followed(type_tag, association.property);

                Some(Association {
                    property: association.property,
                    value,
                    cascade,
                })
            })
            .collect();

        Some(associations)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::Node;
    use crate::traits::{Action, AssociatedValue, CascadeClassifier, Collection};

    use super::{AssociationRules, DescriptorClassifier, TypeDescriptor};

    fn classifier(rules: AssociationRules) -> DescriptorClassifier {
        DescriptorClassifier::new(rules).describe(
            "assay",
            TypeDescriptor::new()
                .association("samples", &[Action::Create, Action::Update], |node: &Node| {
                    node.many("samples")
                })
                .association("instrument_design", &[], |node: &Node| {
                    node.single("instrument_design")
                })
                .association("vectors", &[Action::Create], |node: &Node| {
                    node.many("vectors")
                }),
        )
    }

    #[test]
    fn follows_cascade_metadata() {
        let classifier = classifier(AssociationRules::default());
        let assay = Node::new("assay", 1);

        let targets = classifier
            .cascade_targets(&*assay, Action::Update)
            .unwrap();
        let cascading: Vec<_> = targets
            .iter()
            .map(|association| (association.property, association.cascade))
            .collect();
        assert_eq!(
            cascading,
            vec![
                ("samples", true),
                ("instrument_design", false),
                ("vectors", false)
            ]
        );
    }

    #[test]
    fn rules_override_metadata() {
        let rules = AssociationRules::default()
            .skip("assay", "vectors")
            .always_follow("assay", "instrument_design");
        let classifier = classifier(rules);
        let assay = Node::new("assay", 1);
        assay.link("instrument_design", Node::new("instrument", 2));

        let targets = classifier
            .cascade_targets(&*assay, Action::Create)
            .unwrap();
        assert_eq!(targets.len(), 2);

        let design = targets
            .iter()
            .find(|association| association.property == "instrument_design")
            .unwrap();
        assert!(design.cascade);
        assert!(matches!(design.value, AssociatedValue::Single(Some(_))));
        assert!(
            targets
                .iter()
                .all(|association| association.property != "vectors")
        );
    }

    #[test]
    fn unknown_type_has_no_metadata() {
        let classifier = classifier(AssociationRules::default());
        assert!(
            classifier
                .cascade_targets(&*Node::new("dataset", 1), Action::Create)
                .is_none()
        );
    }

    #[test]
    fn unloaded_collection_is_reported() {
        let classifier = classifier(AssociationRules::default());
        let assay = Node::new("assay", 1);
        assay.set_many("samples", Collection::NotMaterialized);

        let targets = classifier
            .cascade_targets(&*assay, Action::Create)
            .unwrap();
        assert!(matches!(
            targets[0].value,
            AssociatedValue::Many(Collection::NotMaterialized)
        ));
    }
}
