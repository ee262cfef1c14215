//! Deletion planning.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{ActiveBuildSet, ResourceKind};
use crate::inventory::Inventory;

/// Per-kind native names that belong to builds no longer running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcPlan {
    targets: BTreeMap<ResourceKind, BTreeSet<String>>,
}

impl GcPlan {
    /// Plan every inventory against the active builds.
    ///
    /// A resource is planned only when it carries a build id and that id is
    /// not active. Resources without a build id are never planned.
    pub fn compute<'a>(
        inventories: impl IntoIterator<Item = &'a Inventory>,
        active: &ActiveBuildSet,
    ) -> Self {
        let mut plan = GcPlan::default();
        for inventory in inventories {
            let names = plan.targets.entry(inventory.kind).or_default();
            for resource in &inventory.resources {
                match &resource.build_id {
                    Some(id) if !active.contains(id) => {
                        names.insert(resource.native_name.clone());
                    }
                    _ => {}
                }
            }
        }
        plan
    }

    /// Names planned for deletion for `kind`, sorted.
    pub fn targets(&self, kind: ResourceKind) -> Vec<String> {
        self.targets
            .get(&kind)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.targets
            .get(&kind)
            .map(|names| names.contains(name))
            .unwrap_or(false)
    }

    /// Total number of planned deletions across kinds.
    pub fn len(&self) -> usize {
        self.targets.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
