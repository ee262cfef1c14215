//! Backend trait definitions
//!
//! These traits are the only way the reconciler and waiter talk to the
//! outside world:
//! - `ResourceBackend`: list and batch-delete resources of one kind
//! - `BuildOracle`: report the builds a CI service still considers running
//! - `WorkloadApi`: list and inspect jobs/deployments in a namespace
//!
//! Concrete implementations live in `reaper-infra`. In-memory fakes are
//! provided for testing via the `fakes` module.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{RawResource, ResourceKind};
use crate::error::BackendError;
use crate::waiter::{WorkloadKind, WorkloadStatus};

/// Result type for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Lists and deletes the resources of a single kind.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    /// Which kind of resource this backend manages.
    fn kind(&self) -> ResourceKind;

    /// Snapshot every resource currently known to the external system.
    async fn list(&self) -> BackendResult<Vec<RawResource>>;

    /// Delete all `names` in one invocation.
    ///
    /// Callers never pass an empty slice.
    async fn delete(&self, names: &[String]) -> BackendResult<()>;
}

/// The authority on which builds are still running.
#[async_trait]
pub trait BuildOracle: Send + Sync {
    /// Raw response for the running builds of `repo` (`org/name`).
    ///
    /// The payload is returned unvalidated; the reconciler decides whether
    /// it is a usable build list.
    async fn active_builds(&self, repo: &str) -> BackendResult<Value>;
}

/// Read access to the workloads the readiness waiter polls.
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    /// Names of all workloads of `kind` in `namespace`, in API order.
    async fn list(&self, namespace: &str, kind: WorkloadKind) -> BackendResult<Vec<String>>;

    /// Current status of one workload.
    async fn status(
        &self,
        namespace: &str,
        name: &str,
        kind: WorkloadKind,
    ) -> BackendResult<WorkloadStatus>;
}
