//! Kubernetes API backends: namespaces for GC, jobs and deployments for
//! readiness waits.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, ListParams};
use kube::{Client, ResourceExt};
use reaper_core::{
    BackendError, BackendResult, RawResource, ResourceBackend, ResourceKind, WorkloadApi,
    WorkloadKind, WorkloadStatus,
};
use tracing::{debug, info};

fn kube_error(err: kube::Error) -> BackendError {
    BackendError::Kube(err.to_string())
}

/// Client from the local kubeconfig or in-cluster service account.
pub async fn connect() -> BackendResult<Client> {
    Client::try_default().await.map_err(kube_error)
}

/// Whether a namespace phase means deletion is already under way.
pub fn is_terminating(ns: &Namespace) -> bool {
    ns.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(|phase| phase == "Terminating")
        .unwrap_or(false)
}

/// Namespace backend.
#[derive(Clone)]
pub struct KubeNamespaces {
    api: Api<Namespace>,
}

impl KubeNamespaces {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl ResourceBackend for KubeNamespaces {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Namespace
    }

    async fn list(&self) -> BackendResult<Vec<RawResource>> {
        let namespaces = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(kube_error)?;
        Ok(namespaces
            .items
            .iter()
            .map(|ns| RawResource {
                name: ns.name_any(),
                tearing_down: is_terminating(ns),
            })
            .collect())
    }

    /// The API has no bulk namespace delete; names are removed one at a
    /// time and the first failure stops the batch.
    async fn delete(&self, names: &[String]) -> BackendResult<()> {
        for name in names {
            match self.api.delete(name, &DeleteParams::default()).await {
                Ok(_) => debug!("Deleted namespace {}", name),
                Err(kube::Error::Api(ae)) if ae.code == 404 => {
                    info!("Namespace {} already gone", name);
                }
                Err(e) => return Err(kube_error(e)),
            }
        }
        Ok(())
    }
}

/// Job and deployment status for the readiness waiter.
#[derive(Clone)]
pub struct KubeWorkloads {
    client: Client,
}

impl KubeWorkloads {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkloadApi for KubeWorkloads {
    async fn list(&self, namespace: &str, kind: WorkloadKind) -> BackendResult<Vec<String>> {
        let params = ListParams::default();
        let names = match kind {
            WorkloadKind::Job => Api::<Job>::namespaced(self.client.clone(), namespace)
                .list(&params)
                .await
                .map_err(kube_error)?
                .items
                .iter()
                .map(|j| j.name_any())
                .collect(),
            WorkloadKind::Deployment => {
                Api::<Deployment>::namespaced(self.client.clone(), namespace)
                    .list(&params)
                    .await
                    .map_err(kube_error)?
                    .items
                    .iter()
                    .map(|d| d.name_any())
                    .collect()
            }
        };
        Ok(names)
    }

    async fn status(
        &self,
        namespace: &str,
        name: &str,
        kind: WorkloadKind,
    ) -> BackendResult<WorkloadStatus> {
        match kind {
            WorkloadKind::Job => {
                let job = Api::<Job>::namespaced(self.client.clone(), namespace)
                    .get(name)
                    .await
                    .map_err(kube_error)?;
                Ok(job_status(&job))
            }
            WorkloadKind::Deployment => {
                let deployment = Api::<Deployment>::namespaced(self.client.clone(), namespace)
                    .get(name)
                    .await
                    .map_err(kube_error)?;
                Ok(deployment_status(&deployment))
            }
        }
    }
}

/// Absent counters read as zero.
pub fn job_status(job: &Job) -> WorkloadStatus {
    WorkloadStatus::Job {
        succeeded: job.status.as_ref().and_then(|s| s.succeeded).unwrap_or(0),
    }
}

pub fn deployment_status(deployment: &Deployment) -> WorkloadStatus {
    WorkloadStatus::Deployment {
        ready_replicas: deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
    }
}
