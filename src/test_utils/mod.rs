// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
//!
//! A small research-data domain: datasets own assays, assays own samples and reference an
//! instrument design, analyses derive from datasets and own result sets.
mod node;
mod store;

pub use node::Node;
pub use store::{HidingStore, RacingStore};

use crate::caller::Caller;
use crate::cascade::{AssociationRules, DescriptorClassifier, TypeDescriptor};
use crate::config::Config;
use crate::registry::{SecurableType, TypeRegistry};
use crate::sid::DefaultSidResolver;
use crate::store::MemoryAclStore;
use crate::sync::Synchronizer;
use crate::traits::AclStore;
use crate::traits::Action::{Create, Update};

pub type TestSynchronizer = Synchronizer<MemoryAclStore, DescriptorClassifier, DefaultSidResolver>;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

pub fn research_registry() -> TypeRegistry {
    TypeRegistry::new()
        .register("dataset", SecurableType::root_capable())
        .register("instrument", SecurableType::root_capable())
        .register("assay", SecurableType::child_only())
        .register("sample", SecurableType::child_only())
        .register("design", SecurableType::child_only())
        .register("factor", SecurableType::child_only())
        .register("result_set", SecurableType::child_only())
        .register("analysis", SecurableType::derived_analysis())
        .register("gene_set", SecurableType::standard())
        .register("user", SecurableType::user_account())
        .register("user_group", SecurableType::user_group())
}

pub fn research_rules() -> AssociationRules {
    AssociationRules::default()
        .skip("dataset", "raw_vectors")
        .always_follow("assay", "instrument_design")
}

/// Classifier for the research domain. `measurement` entities are not securable, `user_group`
/// has no cascade metadata.
pub fn research_classifier(rules: AssociationRules) -> DescriptorClassifier {
    DescriptorClassifier::new(rules)
        .describe(
            "dataset",
            TypeDescriptor::new()
                .association("assays", &[Create, Update], |node: &Node| node.many("assays"))
                .association("design", &[Create, Update], |node: &Node| node.single("design"))
                .association("raw_vectors", &[Create, Update], |node: &Node| {
                    node.many("raw_vectors")
                }),
        )
        .describe(
            "assay",
            TypeDescriptor::new()
                .association("samples", &[Create, Update], |node: &Node| node.many("samples"))
                .association("instrument_design", &[], |node: &Node| {
                    node.single("instrument_design")
                })
                .association("dataset", &[], |node: &Node| node.single("dataset")),
        )
        .describe(
            "sample",
            TypeDescriptor::new().association("measurements", &[Create, Update], |node: &Node| {
                node.many("measurements")
            }),
        )
        .describe(
            "design",
            TypeDescriptor::new()
                .association("factors", &[Create, Update], |node: &Node| node.many("factors")),
        )
        .describe("factor", TypeDescriptor::new())
        .describe("instrument", TypeDescriptor::new())
        .describe(
            "analysis",
            TypeDescriptor::new().association("result_sets", &[Create, Update], |node: &Node| {
                node.many("result_sets")
            }),
        )
        .describe("result_set", TypeDescriptor::new())
        .describe(
            "gene_set",
            TypeDescriptor::new()
                .association("related", &[Create, Update], |node: &Node| node.many("related"))
                .association("curators", &[Create, Update], |node: &Node| node.many("curators")),
        )
        .describe("user", TypeDescriptor::new())
}

/// Resolver where administrators and agents are users too.
pub fn research_resolver() -> DefaultSidResolver {
    DefaultSidResolver::default()
        .imply("GROUP_ADMIN", "GROUP_USER")
        .imply("GROUP_AGENT", "GROUP_USER")
}

pub fn synchronizer() -> TestSynchronizer {
    synchronizer_with_store(MemoryAclStore::new())
}

/// Synchronizer working on `store`, which may be shared with other synchronizers.
pub fn synchronizer_with_store<S: AclStore>(
    store: S,
) -> Synchronizer<S, DescriptorClassifier, DefaultSidResolver> {
    Synchronizer::new(
        store,
        research_classifier(research_rules()),
        research_resolver(),
        research_registry(),
        Config::default(),
    )
}

pub fn alice() -> Caller {
    Caller::authenticated("alice", ["GROUP_USER"])
}

pub fn carol() -> Caller {
    Caller::authenticated("carol", ["GROUP_USER", "GROUP_LAB"])
}

pub fn bob_admin() -> Caller {
    Caller::authenticated("bob", ["GROUP_ADMIN"])
}
