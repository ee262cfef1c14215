//! Batched deletion of planned resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::backend::ResourceBackend;
use crate::domain::ResourceKind;
use crate::error::{ReaperError, Result};
use crate::plan::GcPlan;

/// Applies a [`GcPlan`] through the per-kind backends.
pub struct DeletionExecutor {
    backends: BTreeMap<ResourceKind, Arc<dyn ResourceBackend>>,
    dry_run: bool,
}

impl DeletionExecutor {
    /// One backend per kind; a second backend of the same kind is rejected.
    pub fn new(
        backends: impl IntoIterator<Item = Arc<dyn ResourceBackend>>,
        dry_run: bool,
    ) -> Result<Self> {
        let mut by_kind = BTreeMap::new();
        for backend in backends {
            let kind = backend.kind();
            if by_kind.insert(kind, backend).is_some() {
                return Err(ReaperError::DuplicateBackend { kind });
            }
        }
        Ok(Self {
            backends: by_kind,
            dry_run,
        })
    }

    /// The backend serving `kind`, used for both listing and deletion.
    pub fn backend(&self, kind: ResourceKind) -> Option<&Arc<dyn ResourceBackend>> {
        self.backends.get(&kind)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Delete every name of `kind` in a single backend call.
    ///
    /// Does nothing for an empty list. In dry-run mode the batch is logged
    /// but never sent.
    pub async fn delete(&self, kind: ResourceKind, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }

        info!("Running delete command for {} {}: {:?}", names.len(), kind, names);
        if self.dry_run {
            info!("noop: skipping {} deletion", kind);
            return Ok(());
        }

        let backend = self
            .backends
            .get(&kind)
            .ok_or(ReaperError::MissingBackend { kind })?;

        backend
            .delete(names)
            .await
            .map_err(|source| ReaperError::DeletionFailed { kind, source })?;
        info!("Deleted {} {}", names.len(), kind);
        Ok(())
    }

    /// Apply `plan` kind by kind in [`ResourceKind::DELETION_ORDER`].
    ///
    /// Stops at the first failing batch; earlier batches stay applied.
    pub async fn apply(&self, plan: &GcPlan) -> Result<()> {
        for kind in ResourceKind::DELETION_ORDER {
            self.delete(kind, &plan.targets(kind)).await?;
        }
        Ok(())
    }
}
