//! Package releases through the `helm` CLI.
//!
//! Without a configured namespace releases are listed across all namespaces.
//! `helm uninstall` needs the namespace a release lives in, so the namespace
//! seen by the last listing is remembered and deletes are issued once per
//! namespace.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use reaper_core::{BackendResult, RawResource, ResourceBackend, ResourceKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command;

/// `helm` invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmConfig {
    /// Executable to run, `helm` unless overridden.
    pub binary: String,

    /// Restrict listing and uninstalling to one namespace.
    pub namespace: Option<String>,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            binary: "helm".to_string(),
            namespace: None,
        }
    }
}

impl HelmConfig {
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    fn list_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["list", "--all", "--output", "json"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match &self.namespace {
            Some(ns) => args.extend(["--namespace".to_string(), ns.clone()]),
            None => args.push("--all-namespaces".to_string()),
        }
        args
    }

    fn uninstall_args(&self, namespace: Option<&str>, names: &[String]) -> Vec<String> {
        let mut args = vec!["uninstall".to_string()];
        if let Some(ns) = namespace {
            args.extend(["--namespace".to_string(), ns.to_string()]);
        }
        args.extend(names.iter().cloned());
        args
    }
}

/// One entry of `helm list --output json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HelmRelease {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl HelmRelease {
    pub fn is_uninstalling(&self) -> bool {
        self.status.as_deref() == Some("uninstalling")
    }
}

/// Parse `helm list --output json` output.
pub fn parse_releases(json: &str) -> BackendResult<Vec<HelmRelease>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

/// Release backend.
#[derive(Debug, Default)]
pub struct HelmReleases {
    config: HelmConfig,
    namespaces: Mutex<HashMap<String, String>>,
}

impl HelmReleases {
    pub fn new(config: HelmConfig) -> Self {
        Self {
            config,
            namespaces: Mutex::new(HashMap::new()),
        }
    }

    /// Group `names` by the namespace they were listed in.
    ///
    /// A configured namespace wins; names never listed get no `--namespace`.
    fn group_by_namespace(&self, names: &[String]) -> BTreeMap<Option<String>, Vec<String>> {
        let known = self
            .namespaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut groups: BTreeMap<Option<String>, Vec<String>> = BTreeMap::new();
        for name in names {
            let namespace = self
                .config
                .namespace
                .clone()
                .or_else(|| known.get(name).cloned());
            groups.entry(namespace).or_default().push(name.clone());
        }
        groups
    }
}

#[async_trait]
impl ResourceBackend for HelmReleases {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Release
    }

    async fn list(&self) -> BackendResult<Vec<RawResource>> {
        let stdout = command::run(&self.config.binary, &self.config.list_args()).await?;
        let releases = parse_releases(&stdout)?;

        let mut known = self
            .namespaces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        known.clear();
        Ok(releases
            .into_iter()
            .map(|release| {
                if let Some(ns) = &release.namespace {
                    known.insert(release.name.clone(), ns.clone());
                }
                RawResource {
                    tearing_down: release.is_uninstalling(),
                    name: release.name,
                }
            })
            .collect())
    }

    async fn delete(&self, names: &[String]) -> BackendResult<()> {
        for (namespace, batch) in self.group_by_namespace(names) {
            debug!(namespace = ?namespace, releases = batch.len(), "Uninstalling releases");
            let args = self.config.uninstall_args(namespace.as_deref(), &batch);
            command::run(&self.config.binary, &args).await?;
        }
        Ok(())
    }
}
