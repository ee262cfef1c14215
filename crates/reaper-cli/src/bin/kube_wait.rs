//! kube-wait - block until a namespace's jobs and deployments are ready
//!
//! Waits for every job to succeed, then for every deployment to have a
//! ready replica. Exits non-zero as soon as one workload misses its timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reaper_core::{init_tracing, level_for, NamespaceWaiter, WaitConfig};
use reaper_infra::KubeWorkloads;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kube-wait")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wait for the jobs and deployments of a namespace to become ready", long_about = None)]
struct Cli {
    /// Namespace to wait on
    namespace: String,

    /// Seconds to wait for each workload
    #[arg(short, long, default_value_t = 60)]
    timeout: u64,

    /// Seconds between status checks
    #[arg(long, default_value_t = 10)]
    interval: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn wait_config(&self) -> WaitConfig {
        WaitConfig::default()
            .with_timeout(Duration::from_secs(self.timeout))
            .with_poll_interval(Duration::from_secs(self.interval))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let client = reaper_infra::connect()
        .await
        .context("Failed to connect to Kubernetes")?;
    let waiter = NamespaceWaiter::new(Arc::new(KubeWorkloads::new(client)), cli.wait_config());

    waiter
        .wait_for_namespace(&cli.namespace)
        .await
        .with_context(|| format!("{} namespace did not become ready", cli.namespace))?;

    info!("All workloads in {} namespace are ready", cli.namespace);
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
        let cli = Cli::try_parse_from(["kube-wait", "circleci-4701"]).unwrap();
        assert_eq!(cli.namespace, "circleci-4701");
        assert_eq!(cli.wait_config(), WaitConfig::default());
    }

    #[test]
    fn test_short_timeout_flag() {
        let cli = Cli::try_parse_from(["kube-wait", "-t", "300", "--interval", "5", "ns"]).unwrap();
        let config = cli.wait_config();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_namespace_is_required() {
        assert!(Cli::try_parse_from(["kube-wait"]).is_err());
    }
}
