//! Readiness polling for freshly created workloads.
//!
//! A [`ReadinessWaiter`] watches one job or deployment until its readiness
//! predicate holds or its deadline passes. [`NamespaceWaiter`] drives one
//! waiter per workload in a namespace, one at a time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{error, info, info_span, Instrument};

use crate::backend::WorkloadApi;
use crate::error::{ReaperError, Result};

/// Default time a single workload is given to become ready.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Workload kinds the waiter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    Job,
    Deployment,
}

impl WorkloadKind {
    pub fn name(&self) -> &'static str {
        match self {
            WorkloadKind::Job => "job",
            WorkloadKind::Deployment => "deployment",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observed status of a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadStatus {
    Job { succeeded: i32 },
    Deployment { ready_replicas: i32 },
}

impl WorkloadStatus {
    /// Job: at least one successful completion.
    /// Deployment: at least one ready replica.
    pub fn is_ready(&self) -> bool {
        match self {
            WorkloadStatus::Job { succeeded } => *succeeded >= 1,
            WorkloadStatus::Deployment { ready_replicas } => *ready_replicas >= 1,
        }
    }
}

/// Timing knobs for readiness waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// The workload a waiter is watching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitTarget {
    pub namespace: String,
    pub name: String,
    pub kind: WorkloadKind,
    pub timeout: Duration,
}

impl WaitTarget {
    pub fn new(namespace: &str, name: &str, kind: WorkloadKind) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
}

/// Waiter state. Starts in `Waiting`; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitState {
    Waiting,
    Done(WaitOutcome),
}

/// Polls a single workload until it is ready or its deadline passes.
pub struct ReadinessWaiter {
    api: Arc<dyn WorkloadApi>,
    target: WaitTarget,
    poll_interval: Duration,
    state: WaitState,
    started: Instant,
    polls: u32,
}

impl ReadinessWaiter {
    /// The deadline starts counting now.
    pub fn new(api: Arc<dyn WorkloadApi>, target: WaitTarget, poll_interval: Duration) -> Self {
        Self {
            api,
            target,
            poll_interval,
            state: WaitState::Waiting,
            started: Instant::now(),
            polls: 0,
        }
    }

    pub fn state(&self) -> WaitState {
        self.state
    }

    pub fn target(&self) -> &WaitTarget {
        &self.target
    }

    /// Number of status queries issued so far, failed ones included.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.target.timeout.saturating_sub(self.elapsed())
    }

    /// Advance the state machine by one status query.
    ///
    /// A failed query is logged and leaves the waiter in `Waiting`; only the
    /// deadline can end a wait unsuccessfully. A query still pending at the
    /// deadline is abandoned.
    pub async fn tick(&mut self) -> WaitState {
        if self.state != WaitState::Waiting {
            return self.state;
        }
        let remaining = self.remaining();
        if remaining.is_zero() {
            self.state = WaitState::Done(WaitOutcome::TimedOut);
            return self.state;
        }

        let WaitTarget {
            namespace,
            name,
            kind,
            ..
        } = &self.target;
        self.polls += 1;
        let query = self.api.status(namespace, name, *kind);
        match tokio::time::timeout(remaining, query).await {
            Ok(Ok(status)) if status.is_ready() => {
                info!("{} {} in {} namespace is ready", name, kind, namespace);
                self.state = WaitState::Done(WaitOutcome::Ready);
            }
            Ok(Ok(_)) => {
                info!("waiting for {} {} in {} namespace", name, kind, namespace);
            }
            Ok(Err(e)) => {
                error!("Unable to obtain {} {} in {} namespace: {}", name, kind, namespace, e);
            }
            Err(_) => {
                error!(
                    "Status query for {} {} in {} namespace still pending at the deadline",
                    name, kind, namespace
                );
                self.state = WaitState::Done(WaitOutcome::TimedOut);
            }
        }
        self.state
    }

    /// Poll until the workload is ready.
    ///
    /// Returns `DeadlineExceeded` naming the workload when the timeout passes.
    pub async fn wait(&mut self) -> Result<WaitOutcome> {
        let span = info_span!(
            "wait",
            namespace = %self.target.namespace,
            name = %self.target.name,
            kind = %self.target.kind
        );
        async {
            loop {
                match self.tick().await {
                    WaitState::Done(WaitOutcome::Ready) => return Ok(WaitOutcome::Ready),
                    WaitState::Done(WaitOutcome::TimedOut) => {
                        let elapsed = self.elapsed();
                        error!(
                            "{} {} in namespace {} failed to become ready in {}s",
                            self.target.name,
                            self.target.kind,
                            self.target.namespace,
                            self.target.timeout.as_secs()
                        );
                        return Err(ReaperError::DeadlineExceeded {
                            kind: self.target.kind,
                            namespace: self.target.namespace.clone(),
                            name: self.target.name.clone(),
                            elapsed,
                        });
                    }
                    WaitState::Waiting => {
                        tokio::time::sleep(self.poll_interval.min(self.remaining())).await
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Waits for every workload in a namespace, sequentially.
pub struct NamespaceWaiter {
    api: Arc<dyn WorkloadApi>,
    config: WaitConfig,
}

impl NamespaceWaiter {
    pub fn new(api: Arc<dyn WorkloadApi>, config: WaitConfig) -> Self {
        Self { api, config }
    }

    /// Wait for each workload of `kind` present in `namespace` right now.
    ///
    /// Workloads are awaited in listing order; the first timeout aborts the
    /// rest. Returns how many workloads became ready.
    pub async fn wait_for_all(&self, namespace: &str, kind: WorkloadKind) -> Result<usize> {
        let names = self
            .api
            .list(namespace, kind)
            .await
            .map_err(|source| ReaperError::WorkloadListing {
                kind,
                namespace: namespace.to_string(),
                source,
            })?;

        info!("Waiting for {} {}(s) in {} namespace", names.len(), kind, namespace);
        for name in &names {
            let target = WaitTarget::new(namespace, name, kind).with_timeout(self.config.timeout);
            ReadinessWaiter::new(self.api.clone(), target, self.config.poll_interval)
                .wait()
                .await?;
        }
        Ok(names.len())
    }

    /// All jobs first, then all deployments.
    pub async fn wait_for_namespace(&self, namespace: &str) -> Result<()> {
        self.wait_for_all(namespace, WorkloadKind::Job).await?;
        self.wait_for_all(namespace, WorkloadKind::Deployment).await?;
        Ok(())
    }
}
