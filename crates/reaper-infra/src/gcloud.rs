//! Compute instances through the `gcloud` CLI.

use async_trait::async_trait;
use reaper_core::{BackendResult, RawResource, ResourceBackend, ResourceKind, DEFAULT_PREFIX};
use serde::{Deserialize, Serialize};

use crate::command;

/// Zone build instances are created in.
pub const DEFAULT_ZONE: &str = "us-west1-b";

/// `gcloud` invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcloudConfig {
    /// Executable to run, `gcloud` unless overridden.
    pub binary: String,

    /// Zone passed to `instances delete`.
    pub zone: String,

    /// Build prefix used to narrow the server-side listing.
    pub prefix: String,
}

impl Default for GcloudConfig {
    fn default() -> Self {
        Self {
            binary: "gcloud".to_string(),
            zone: DEFAULT_ZONE.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl GcloudConfig {
    pub fn with_zone(mut self, zone: &str) -> Self {
        self.zone = zone.to_string();
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    fn list_args(&self) -> Vec<String> {
        vec![
            "compute".to_string(),
            "instances".to_string(),
            "list".to_string(),
            "--filter".to_string(),
            format!("name:(condor-{}-*)", self.prefix),
            "--format".to_string(),
            "json(name,status)".to_string(),
        ]
    }

    fn delete_args(&self, names: &[String]) -> Vec<String> {
        let mut args = vec![
            "compute".to_string(),
            "instances".to_string(),
            "delete".to_string(),
            format!("--zone={}", self.zone),
            "--quiet".to_string(),
        ];
        args.extend(names.iter().cloned());
        args
    }
}

#[derive(Debug, Deserialize)]
struct Instance {
    name: String,
    #[serde(default)]
    status: Option<String>,
}

/// Parse `gcloud compute instances list --format json(name,status)` output.
///
/// Instances reported as `STOPPING` are already on their way out.
pub fn parse_instances(json: &str) -> BackendResult<Vec<RawResource>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let instances: Vec<Instance> = serde_json::from_str(json)?;
    Ok(instances
        .into_iter()
        .map(|i| RawResource {
            tearing_down: i.status.as_deref() == Some("STOPPING"),
            name: i.name,
        })
        .collect())
}

/// VM backend for build instances.
#[derive(Debug, Clone, Default)]
pub struct GcloudInstances {
    config: GcloudConfig,
}

impl GcloudInstances {
    pub fn new(config: GcloudConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GcloudConfig {
        &self.config
    }
}

#[async_trait]
impl ResourceBackend for GcloudInstances {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Vm
    }

    async fn list(&self) -> BackendResult<Vec<RawResource>> {
        let stdout = command::run(&self.config.binary, &self.config.list_args()).await?;
        parse_instances(&stdout)
    }

    async fn delete(&self, names: &[String]) -> BackendResult<()> {
        command::run(&self.config.binary, &self.config.delete_args(names)).await?;
        Ok(())
    }
}
