//! namespace-gc - delete the test infrastructure of finished CI builds
//!
//! Lists cluster namespaces, compute instances and helm releases named after
//! a build, asks CircleCI which builds of the repository are still running,
//! and deletes everything that belongs to the others.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use reaper_core::{
    init_tracing, level_for, ReaperConfig, Reconciler, ResourceBackend, DEFAULT_PREFIX,
    SYSTEM_NAMESPACES,
};
use reaper_infra::circleci::DEFAULT_API_URL;
use reaper_infra::gcloud::DEFAULT_ZONE;
use reaper_infra::{
    CircleCiClient, CircleCiConfig, GcloudConfig, GcloudInstances, HelmConfig, HelmReleases,
    KubeNamespaces,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "namespace-gc")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Garbage-collect namespaces, VMs and releases of finished CI builds", long_about = None)]
struct Cli {
    /// GitHub repository the builds belong to (org/repo)
    repo: String,

    /// Log what would be deleted without deleting anything
    #[arg(long)]
    noop: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Naming prefix shared by every build resource
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Compute zone build instances live in
    #[arg(long, default_value = DEFAULT_ZONE)]
    zone: String,

    /// Namespace never to touch (repeatable; replaces the system defaults)
    #[arg(long = "ignore-namespace", value_name = "NAME")]
    ignore_namespaces: Vec<String>,

    /// Only consider helm releases in this namespace
    #[arg(long)]
    helm_namespace: Option<String>,

    /// CircleCI API token
    #[arg(long, env = "CIRCLE_TOKEN", hide_env_values = true)]
    circle_token: Option<String>,

    /// CircleCI API root
    #[arg(long, env = "CIRCLE_API_URL", default_value = DEFAULT_API_URL)]
    circle_api_url: String,
}

impl Cli {
    fn reaper_config(&self) -> ReaperConfig {
        let ignored = if self.ignore_namespaces.is_empty() {
            SYSTEM_NAMESPACES.iter().map(|s| s.to_string()).collect()
        } else {
            self.ignore_namespaces.clone()
        };
        ReaperConfig::default()
            .with_prefix(&self.prefix)
            .with_dry_run(self.noop)
            .with_ignored_namespaces(ignored)
    }

    fn circleci_config(&self) -> Result<CircleCiConfig> {
        let token = self
            .circle_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("CIRCLE_TOKEN must be set to query running builds")?;
        Ok(CircleCiConfig::new(token).with_base_url(&self.circle_api_url))
    }

    fn gcloud_config(&self) -> GcloudConfig {
        GcloudConfig::default()
            .with_zone(&self.zone)
            .with_prefix(&self.prefix)
    }

    fn helm_config(&self) -> HelmConfig {
        HelmConfig::default().with_namespace(self.helm_namespace.clone())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let oracle = CircleCiClient::new(cli.circleci_config()?)?;
    let client = reaper_infra::connect()
        .await
        .context("Failed to connect to Kubernetes")?;

    let backends: Vec<Arc<dyn ResourceBackend>> = vec![
        Arc::new(KubeNamespaces::new(client)),
        Arc::new(GcloudInstances::new(cli.gcloud_config())),
        Arc::new(HelmReleases::new(cli.helm_config())),
    ];
    let reconciler = Reconciler::new(cli.reaper_config(), backends, Arc::new(oracle))
        .context("Invalid naming prefix")?;

    let report = reconciler
        .run_pass(&cli.repo)
        .await
        .with_context(|| format!("Garbage collection for {} failed", cli.repo))?;

    if report.dry_run {
        info!("noop: {} deletion(s) skipped", report.plan.len());
    } else {
        info!("Deleted {} resource(s)", report.plan.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["namespace-gc", "--circle-token", "t", "hypothesis/h"])
            .unwrap();
        assert_eq!(cli.repo, "hypothesis/h");
        assert!(!cli.noop);
        assert_eq!(cli.prefix, "circleci");
        assert_eq!(cli.zone, "us-west1-b");

        let config = cli.reaper_config();
        assert!(!config.dry_run);
        assert_eq!(
            config.ignored_namespaces,
            vec!["default", "kube-system", "kube-public"]
        );
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "namespace-gc",
            "--noop",
            "--verbose",
            "--prefix",
            "nightly",
            "--ignore-namespace",
            "monitoring",
            "--ignore-namespace",
            "default",
            "--helm-namespace",
            "ci",
            "--circle-token",
            "t",
            "org/repo",
        ])
        .unwrap();

        let config = cli.reaper_config();
        assert!(config.dry_run);
        assert_eq!(config.prefix, "nightly");
        assert_eq!(config.ignored_namespaces, vec!["monitoring", "default"]);
        assert_eq!(cli.helm_config().namespace.as_deref(), Some("ci"));
        assert_eq!(cli.gcloud_config().prefix, "nightly");
    }

    #[test]
    fn test_repo_is_required() {
        assert!(Cli::try_parse_from(["namespace-gc", "--noop"]).is_err());
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let cli = Cli {
            circle_token: None,
            ..Cli::try_parse_from(["namespace-gc", "--circle-token", "t", "org/repo"]).unwrap()
        };
        assert!(cli.circleci_config().is_err());
    }
}
