//! Reaper-Core: Garbage Collection for CI Test Infrastructure
//!
//! Every CI build provisions a Kubernetes namespace, a compute instance and
//! one or more helm releases, all named after its build number. This crate
//! finds the ones whose build is no longer running and deletes them, and
//! provides the readiness waiter used after provisioning.
//!
//! ## Key Components
//!
//! - `Correlator`: naming conventions mapping resource names to build numbers
//! - `InventoryCollector`: backend listing -> correlated `Inventory`
//! - `Reconciler`: one GC pass (snapshot, oracle query, plan, delete)
//! - `DeletionExecutor`: batched, ordered deletion with dry-run support
//! - `ReadinessWaiter` / `NamespaceWaiter`: poll jobs and deployments until ready
//!
//! Backends are reached only through the traits in [`backend`].

pub mod backend;
pub mod correlator;
pub mod domain;
mod error;
pub mod executor;
pub mod fakes;
pub mod inventory;
pub mod plan;
pub mod reconciler;
pub mod telemetry;
pub mod waiter;

pub use backend::{BackendResult, BuildOracle, ResourceBackend, WorkloadApi};
pub use correlator::{Correlator, DEFAULT_PREFIX};
pub use domain::{ActiveBuildSet, BuildId, ManagedResource, RawResource, ResourceKind};
pub use error::{BackendError, ReaperError, Result};
pub use executor::DeletionExecutor;
pub use inventory::{Inventory, InventoryCollector, SYSTEM_NAMESPACES};
pub use plan::GcPlan;
pub use reconciler::{PassReport, ReaperConfig, Reconciler};
pub use telemetry::{init_tracing, level_for};
pub use waiter::{
    NamespaceWaiter, ReadinessWaiter, WaitConfig, WaitOutcome, WaitState, WaitTarget,
    WorkloadKind, WorkloadStatus,
};
