//! Reconciliation pass: inventory -> oracle -> plan -> delete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::backend::{BuildOracle, ResourceBackend};
use crate::correlator::{Correlator, DEFAULT_PREFIX};
use crate::domain::{ActiveBuildSet, ResourceKind};
use crate::error::{ReaperError, Result};
use crate::executor::DeletionExecutor;
use crate::inventory::{Inventory, InventoryCollector, SYSTEM_NAMESPACES};
use crate::plan::GcPlan;

/// Settings for one reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Naming prefix shared by every resource a build provisions.
    pub prefix: String,

    /// Compute and log plans without deleting anything.
    pub dry_run: bool,

    /// Namespaces never considered, regardless of name.
    pub ignored_namespaces: Vec<String>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            dry_run: false,
            ignored_namespaces: SYSTEM_NAMESPACES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ReaperConfig {
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_ignored_namespaces(mut self, names: Vec<String>) -> Self {
        self.ignored_namespaces = names;
        self
    }
}

/// What a pass saw and decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub repo: String,
    pub active_builds: ActiveBuildSet,
    pub inventories: Vec<Inventory>,
    pub plan: GcPlan,
    pub dry_run: bool,
}

/// Deletes resources of builds the CI service no longer reports as running.
///
/// Assumes it is the only pass running; overlapping passes are not guarded
/// against.
pub struct Reconciler {
    oracle: Arc<dyn BuildOracle>,
    collector: InventoryCollector,
    executor: DeletionExecutor,
    dry_run: bool,
}

impl Reconciler {
    /// Build a reconciler over one backend per [`ResourceKind`].
    ///
    /// Fails if `config.prefix` cannot be turned into naming patterns or if
    /// two backends serve the same kind. Listing and deletion of a kind always
    /// go through the same backend.
    pub fn new(
        config: ReaperConfig,
        backends: Vec<Arc<dyn ResourceBackend>>,
        oracle: Arc<dyn BuildOracle>,
    ) -> Result<Self> {
        let correlator = Correlator::new(&config.prefix)?;
        let collector = InventoryCollector::with_ignored(correlator, config.ignored_namespaces);
        let executor = DeletionExecutor::new(backends, config.dry_run)?;
        Ok(Self {
            oracle,
            collector,
            executor,
            dry_run: config.dry_run,
        })
    }

    /// Run one full pass for `repo`.
    pub async fn run_pass(&self, repo: &str) -> Result<PassReport> {
        let pass_id = Uuid::new_v4();
        let span = info_span!("gc_pass", %pass_id, repo);
        self.pass(pass_id, repo).instrument(span).await
    }

    async fn pass(&self, pass_id: Uuid, repo: &str) -> Result<PassReport> {
        let started_at = Utc::now();

        // Inventories must be taken before the oracle is asked. A build that
        // provisions something after the snapshot is already running by the
        // time of the query, so it can only be missed, never wrongly deleted.
        let inventories = self.snapshot().await?;

        let payload = self
            .oracle
            .active_builds(repo)
            .await
            .map_err(ReaperError::Oracle)?;
        let active_builds = ActiveBuildSet::from_response(&payload)?;
        debug!("Active builds: {:?}", active_builds.iter().collect::<Vec<_>>());

        let plan = GcPlan::compute(&inventories, &active_builds);
        for inventory in &inventories {
            debug!(
                "Active {}: {:?}",
                inventory.kind,
                inventory.names().collect::<Vec<_>>()
            );
            debug!("{} to GC: {:?}", inventory.kind, plan.targets(inventory.kind));
        }
        info!(
            "Planned {} deletion(s) for {} ({} active build(s))",
            plan.len(),
            repo,
            active_builds.len()
        );

        self.executor.apply(&plan).await?;

        Ok(PassReport {
            pass_id,
            started_at,
            repo: repo.to_string(),
            active_builds,
            inventories,
            plan,
            dry_run: self.dry_run,
        })
    }

    async fn snapshot(&self) -> Result<Vec<Inventory>> {
        let mut inventories = Vec::with_capacity(ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            let inventory = match self.executor.backend(kind) {
                Some(backend) => self.collector.collect(backend.as_ref()).await?,
                None => Inventory::empty(kind),
            };
            inventories.push(inventory);
        }
        Ok(inventories)
    }
}
