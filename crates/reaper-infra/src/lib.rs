//! Reaper-Infra: concrete backends for ci-reaper
//!
//! - [`cluster`]: namespaces, jobs and deployments through the Kubernetes API
//! - [`gcloud`]: compute instances through the `gcloud` CLI
//! - [`helm`]: package releases through the `helm` CLI
//! - [`circleci`]: the running-build oracle over the CircleCI v1.1 API
//!
//! External CLIs are driven through [`command::run`]; their JSON output is
//! parsed by pure functions so it can be tested without the tools installed.

pub mod circleci;
pub mod cluster;
pub mod command;
pub mod gcloud;
pub mod helm;

pub use circleci::{CircleCiClient, CircleCiConfig};
pub use cluster::{connect, KubeNamespaces, KubeWorkloads};
pub use gcloud::{GcloudConfig, GcloudInstances};
pub use helm::{HelmConfig, HelmReleases};
