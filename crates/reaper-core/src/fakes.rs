//! In-memory fakes for the backend traits (testing only)
//!
//! Provides `MemoryBackend`, `MemoryOracle` and `MemoryWorkloads` that
//! satisfy the trait contracts without touching a cluster, a cloud project
//! or the CI service. Every call is recorded so tests can assert on what
//! would have been sent.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::*;
use crate::domain::{RawResource, ResourceKind};
use crate::error::BackendError;
use crate::waiter::{WorkloadKind, WorkloadStatus};

/// Log of calls shared by several fakes, in the order they happened.
pub type CallLog = std::sync::Arc<Mutex<Vec<String>>>;

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// In-memory resource listing for one kind.
///
/// Successful deletes remove the resources, so a second pass sees the
/// updated state.
#[derive(Debug)]
pub struct MemoryBackend {
    kind: ResourceKind,
    resources: Mutex<Vec<RawResource>>,
    deletes: Mutex<Vec<Vec<String>>>,
    list_error: Option<String>,
    delete_error: Option<String>,
    journal: Option<CallLog>,
}

impl MemoryBackend {
    pub fn new(kind: ResourceKind, resources: Vec<RawResource>) -> Self {
        Self {
            kind,
            resources: Mutex::new(resources),
            deletes: Mutex::new(Vec::new()),
            list_error: None,
            delete_error: None,
            journal: None,
        }
    }

    /// Backend holding live resources with the given names.
    pub fn with_names(kind: ResourceKind, names: &[&str]) -> Self {
        Self::new(kind, names.iter().map(|n| RawResource::new(*n)).collect())
    }

    /// Every `list` call fails with `message`.
    pub fn failing_list(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// Every `delete` call fails with `message` (the call is still recorded).
    pub fn failing_delete(mut self, message: &str) -> Self {
        self.delete_error = Some(message.to_string());
        self
    }

    /// Record `list:<kind>` / `delete:<kind>` entries into a shared log.
    pub fn journaled(mut self, journal: CallLog) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Batches passed to `delete`, in call order.
    pub fn delete_calls(&self) -> Vec<Vec<String>> {
        self.deletes.lock().unwrap().clone()
    }

    /// Names currently present.
    pub fn names(&self) -> Vec<String> {
        self.resources
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    fn record(&self, op: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(format!("{op}:{}", self.kind));
        }
    }

    fn failure(&self, message: &str) -> BackendError {
        BackendError::CommandFailed {
            command: format!("fake {}", self.kind),
            status: "exit status: 1".to_string(),
            stderr: message.to_string(),
        }
    }
}

#[async_trait]
impl ResourceBackend for MemoryBackend {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list(&self) -> BackendResult<Vec<RawResource>> {
        self.record("list");
        if let Some(message) = &self.list_error {
            return Err(self.failure(message));
        }
        Ok(self.resources.lock().unwrap().clone())
    }

    async fn delete(&self, names: &[String]) -> BackendResult<()> {
        self.record("delete");
        self.deletes.lock().unwrap().push(names.to_vec());
        if let Some(message) = &self.delete_error {
            return Err(self.failure(message));
        }
        self.resources
            .lock()
            .unwrap()
            .retain(|r| !names.contains(&r.name));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryOracle
// ---------------------------------------------------------------------------

/// Oracle that returns a fixed payload.
#[derive(Debug)]
pub struct MemoryOracle {
    payload: Mutex<Value>,
    queries: Mutex<Vec<String>>,
    journal: Option<CallLog>,
}

impl MemoryOracle {
    /// Oracle reporting `build_nums` as running.
    pub fn running(build_nums: &[&str]) -> Self {
        let records: Vec<Value> = build_nums
            .iter()
            .map(|n| json!({ "build_num": n, "status": "running" }))
            .collect();
        Self::with_payload(Value::Array(records))
    }

    /// Oracle returning an arbitrary payload, e.g. an error object.
    pub fn with_payload(payload: Value) -> Self {
        Self {
            payload: Mutex::new(payload),
            queries: Mutex::new(Vec::new()),
            journal: None,
        }
    }

    pub fn journaled(mut self, journal: CallLog) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Replace the payload returned by later queries.
    pub fn set_payload(&self, payload: Value) {
        *self.payload.lock().unwrap() = payload;
    }

    /// Repositories queried, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildOracle for MemoryOracle {
    async fn active_builds(&self, repo: &str) -> BackendResult<Value> {
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push("oracle".to_string());
        }
        self.queries.lock().unwrap().push(repo.to_string());
        Ok(self.payload.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryWorkloads
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FakeWorkload {
    name: String,
    kind: WorkloadKind,
    /// Becomes ready on this status query (1-based); 0 means never.
    ready_after: u32,
    queries: u32,
}

/// In-memory jobs and deployments keyed by namespace.
#[derive(Debug, Default)]
pub struct MemoryWorkloads {
    workloads: Mutex<HashMap<String, Vec<FakeWorkload>>>,
    failures_left: Mutex<u32>,
}

impl MemoryWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Job that succeeds on its `ready_after`-th status query (0 = never).
    pub fn add_job(&self, namespace: &str, name: &str, ready_after: u32) {
        self.add(namespace, name, WorkloadKind::Job, ready_after);
    }

    /// Deployment that has a ready replica from its `ready_after`-th query on.
    pub fn add_deployment(&self, namespace: &str, name: &str, ready_after: u32) {
        self.add(namespace, name, WorkloadKind::Deployment, ready_after);
    }

    /// The next `n` status queries fail as if the API were unreachable.
    pub fn fail_next_queries(&self, n: u32) {
        *self.failures_left.lock().unwrap() = n;
    }

    /// Status queries served so far for one workload.
    pub fn queries(&self, namespace: &str, name: &str) -> u32 {
        self.workloads
            .lock()
            .unwrap()
            .get(namespace)
            .and_then(|ws| ws.iter().find(|w| w.name == name))
            .map(|w| w.queries)
            .unwrap_or(0)
    }

    fn add(&self, namespace: &str, name: &str, kind: WorkloadKind, ready_after: u32) {
        self.workloads
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .push(FakeWorkload {
                name: name.to_string(),
                kind,
                ready_after,
                queries: 0,
            });
    }
}

#[async_trait]
impl WorkloadApi for MemoryWorkloads {
    async fn list(&self, namespace: &str, kind: WorkloadKind) -> BackendResult<Vec<String>> {
        Ok(self
            .workloads
            .lock()
            .unwrap()
            .get(namespace)
            .map(|ws| {
                ws.iter()
                    .filter(|w| w.kind == kind)
                    .map(|w| w.name.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn status(
        &self,
        namespace: &str,
        name: &str,
        kind: WorkloadKind,
    ) -> BackendResult<WorkloadStatus> {
        {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(BackendError::Kube("connection refused".to_string()));
            }
        }

        let mut workloads = self.workloads.lock().unwrap();
        let workload = workloads
            .get_mut(namespace)
            .and_then(|ws| ws.iter_mut().find(|w| w.name == name && w.kind == kind))
            .ok_or_else(|| BackendError::Kube(format!("{kind} {name} not found in {namespace}")))?;

        workload.queries += 1;
        let ready = i32::from(workload.ready_after != 0 && workload.queries >= workload.ready_after);
        Ok(match kind {
            WorkloadKind::Job => WorkloadStatus::Job { succeeded: ready },
            WorkloadKind::Deployment => WorkloadStatus::Deployment {
                ready_replicas: ready,
            },
        })
    }
}
