//! Inventory collection: backend listing -> correlated resources.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::ResourceBackend;
use crate::correlator::Correlator;
use crate::domain::{ManagedResource, ResourceKind};
use crate::error::{ReaperError, Result};

/// Namespaces that belong to the cluster itself.
pub const SYSTEM_NAMESPACES: [&str; 3] = ["default", "kube-system", "kube-public"];

/// Point-in-time snapshot of one kind of resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub kind: ResourceKind,

    /// Resources whose name matched the kind's convention.
    pub resources: Vec<ManagedResource>,

    /// Names that did not match, kept for diagnostics only.
    pub unmatched: Vec<String>,
}

impl Inventory {
    pub fn empty(kind: ResourceKind) -> Self {
        Self {
            kind,
            resources: Vec::new(),
            unmatched: Vec::new(),
        }
    }

    /// Native names of all correlated resources.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.native_name.as_str())
    }
}

/// Turns backend listings into inventories.
///
/// The ignore list only applies to namespaces.
#[derive(Debug, Clone)]
pub struct InventoryCollector {
    correlator: Correlator,
    ignored: HashSet<String>,
}

impl InventoryCollector {
    /// Collector that skips the cluster's system namespaces.
    pub fn new(correlator: Correlator) -> Self {
        Self::with_ignored(correlator, SYSTEM_NAMESPACES.iter().map(|s| s.to_string()))
    }

    /// Collector with an explicit ignore list, replacing the defaults.
    pub fn with_ignored(correlator: Correlator, ignored: impl IntoIterator<Item = String>) -> Self {
        Self {
            correlator,
            ignored: ignored.into_iter().collect(),
        }
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// List `backend` and correlate every live, non-ignored resource.
    pub async fn collect(&self, backend: &dyn ResourceBackend) -> Result<Inventory> {
        let kind = backend.kind();
        let raw = backend
            .list()
            .await
            .map_err(|source| ReaperError::Inventory { kind, source })?;

        let mut inventory = Inventory::empty(kind);
        for item in raw {
            if item.tearing_down {
                debug!("Skipping {} {} already being torn down", kind, item.name);
                continue;
            }
            if kind == ResourceKind::Namespace && self.ignored.contains(&item.name) {
                continue;
            }
            let resource = self.correlator.classify(kind, &item.name);
            if resource.build_id.is_some() {
                inventory.resources.push(resource);
            } else {
                debug!("Found unexpected {}: {}", kind, item.name);
                inventory.unmatched.push(item.name);
            }
        }

        debug!(
            kind = %kind,
            matched = inventory.resources.len(),
            unmatched = inventory.unmatched.len(),
            "Collected inventory"
        );
        Ok(inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildId, RawResource};
    use crate::fakes::MemoryBackend;

    #[tokio::test]
    async fn test_collect_namespaces_skips_system_and_unmatched() {
        let backend = MemoryBackend::new(
            ResourceKind::Namespace,
            vec![
                RawResource::new("123"),
                RawResource::new("circleci-4701"),
                RawResource::new("circleci-4702"),
                RawResource::new("default"),
                RawResource::new("kube-public"),
                RawResource::new("kube-system"),
            ],
        );
        let collector = InventoryCollector::new(Correlator::default());

        let inventory = collector.collect(&backend).await.unwrap();

        let ids: Vec<_> = inventory
            .resources
            .iter()
            .filter_map(|r| r.build_id.clone())
            .collect();
        assert_eq!(ids, vec![BuildId::new("4701"), BuildId::new("4702")]);
        assert_eq!(inventory.unmatched, vec!["123".to_string()]);
    }

    #[tokio::test]
    async fn test_collect_skips_resources_being_torn_down() {
        let backend = MemoryBackend::new(
            ResourceKind::Namespace,
            vec![
                RawResource::tearing_down("circleci-10"),
                RawResource::new("circleci-11"),
            ],
        );
        let collector = InventoryCollector::new(Correlator::default());

        let inventory = collector.collect(&backend).await.unwrap();
        assert_eq!(inventory.names().collect::<Vec<_>>(), vec!["circleci-11"]);
        assert!(inventory.unmatched.is_empty());
    }

    #[tokio::test]
    async fn test_collect_releases_keeps_every_release_per_build() {
        let backend = MemoryBackend::new(
            ResourceKind::Release,
            vec![
                RawResource::new("cloud-testing-circleci-4706"),
                RawResource::new("h-celery-circleci-4706"),
                RawResource::new("external-dns-kube-system"),
            ],
        );
        let collector = InventoryCollector::new(Correlator::default());

        let inventory = collector.collect(&backend).await.unwrap();
        assert_eq!(inventory.resources.len(), 2);
        assert_eq!(inventory.unmatched, vec!["external-dns-kube-system".to_string()]);
    }

    #[tokio::test]
    async fn test_custom_ignore_list_replaces_defaults() {
        let backend = MemoryBackend::new(
            ResourceKind::Namespace,
            vec![RawResource::new("circleci-1"), RawResource::new("circleci-2")],
        );
        let collector =
            InventoryCollector::with_ignored(Correlator::default(), vec!["circleci-1".to_string()]);

        let inventory = collector.collect(&backend).await.unwrap();
        assert_eq!(inventory.names().collect::<Vec<_>>(), vec!["circleci-2"]);
    }

    #[tokio::test]
    async fn test_listing_failure_names_the_kind() {
        let backend = MemoryBackend::new(ResourceKind::Vm, vec![]).failing_list("quota exceeded");
        let collector = InventoryCollector::new(Correlator::default());

        let err = collector.collect(&backend).await.unwrap_err();
        assert!(matches!(
            err,
            ReaperError::Inventory {
                kind: ResourceKind::Vm,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_ignore_list_leaves_other_kinds_alone() {
        let backend = MemoryBackend::with_names(ResourceKind::Release, &["web-circleci-1"]);
        let collector = InventoryCollector::with_ignored(
            Correlator::default(),
            vec!["web-circleci-1".to_string()],
        );

        let inventory = collector.collect(&backend).await.unwrap();
        assert_eq!(inventory.names().collect::<Vec<_>>(), vec!["web-circleci-1"]);
    }
}
