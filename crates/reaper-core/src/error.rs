//! Error taxonomy for ci-reaper.
//!
//! Backend calls fail with [`BackendError`]; the reconciler and waiter wrap
//! those into [`ReaperError`], which is what reaches the binaries.

use std::time::Duration;

use thiserror::Error;

use crate::domain::ResourceKind;
use crate::waiter::WorkloadKind;

/// Errors raised by an external system (cluster API, CLI tool, CI service).
#[derive(Error, Debug)]
pub enum BackendError {
    /// External command exited non-zero
    #[error("command `{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// External command could not be started
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Output of an external system could not be parsed
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport or status error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(String),

    /// Missing or invalid client configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that abort a reconciliation pass or a readiness wait.
#[derive(Error, Debug)]
pub enum ReaperError {
    #[error("failed to list {kind} resources: {source}")]
    Inventory {
        kind: ResourceKind,
        #[source]
        source: BackendError,
    },

    #[error("build oracle query failed: {0}")]
    Oracle(#[source] BackendError),

    /// The oracle answered with something other than a list of build records.
    /// Carries the raw payload so operators can see what came back.
    #[error("unexpected build oracle response: {payload}")]
    UnexpectedOracleResponse { payload: String },

    #[error("failed to delete {kind} resources: {source}")]
    DeletionFailed {
        kind: ResourceKind,
        #[source]
        source: BackendError,
    },

    #[error("{name} {kind} in {namespace} namespace not ready after {}s", .elapsed.as_secs())]
    DeadlineExceeded {
        kind: WorkloadKind,
        namespace: String,
        name: String,
        elapsed: Duration,
    },

    #[error("listing {kind}s in {namespace} namespace failed: {source}")]
    WorkloadListing {
        kind: WorkloadKind,
        namespace: String,
        #[source]
        source: BackendError,
    },

    #[error("more than one backend configured for {kind}")]
    DuplicateBackend { kind: ResourceKind },

    #[error("no backend configured for {kind}")]
    MissingBackend { kind: ResourceKind },

    #[error("invalid resource prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}

/// Result type for ci-reaper operations.
pub type Result<T> = std::result::Result<T, ReaperError>;
