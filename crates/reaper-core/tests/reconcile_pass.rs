//! Integration tests for full reconciliation passes over in-memory backends.

use std::sync::{Arc, Mutex};

use reaper_core::fakes::{CallLog, MemoryBackend, MemoryOracle};
use reaper_core::{
    RawResource, ReaperConfig, ReaperError, Reconciler, ResourceBackend, ResourceKind,
};
use serde_json::json;

struct Fixture {
    namespaces: Arc<MemoryBackend>,
    vms: Arc<MemoryBackend>,
    releases: Arc<MemoryBackend>,
    oracle: Arc<MemoryOracle>,
    journal: CallLog,
}

impl Fixture {
    /// A cluster with two build namespaces, two build VMs and a mix of releases.
    fn new(active: &[&str]) -> Self {
        let journal: CallLog = Arc::new(Mutex::new(Vec::new()));
        let namespaces = MemoryBackend::new(
            ResourceKind::Namespace,
            vec![
                RawResource::new("123"),
                RawResource::new("circleci-4701"),
                RawResource::new("circleci-4702"),
                RawResource::new("default"),
                RawResource::new("kube-public"),
                RawResource::new("kube-system"),
            ],
        )
        .journaled(journal.clone());
        let vms = MemoryBackend::with_names(
            ResourceKind::Vm,
            &["condor-circleci-4701", "condor-circleci-4702"],
        )
        .journaled(journal.clone());
        let releases = MemoryBackend::with_names(
            ResourceKind::Release,
            &[
                "cloud-testing-circleci-4706",
                "cloud-testing-circleci-4707",
                "condor-service-circleci-4702",
                "condor-service-circleci-4705",
                "cron-kube-system",
                "external-dns-kube-system",
                "h-celery-circleci-4701",
                "h-celery-circleci-4705",
                "h-celery-circleci-4710",
            ],
        )
        .journaled(journal.clone());
        let oracle = MemoryOracle::running(active).journaled(journal.clone());

        Self {
            namespaces: Arc::new(namespaces),
            vms: Arc::new(vms),
            releases: Arc::new(releases),
            oracle: Arc::new(oracle),
            journal,
        }
    }

    fn reconciler(&self, config: ReaperConfig) -> Reconciler {
        Reconciler::new(
            config,
            vec![
                self.namespaces.clone() as Arc<dyn ResourceBackend>,
                self.vms.clone() as Arc<dyn ResourceBackend>,
                self.releases.clone() as Arc<dyn ResourceBackend>,
            ],
            self.oracle.clone(),
        )
        .expect("valid config")
    }

    fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_gc_pass_deletes_resources_of_finished_builds() {
    let fx = Fixture::new(&["123", "4701"]);
    let reconciler = fx.reconciler(ReaperConfig::default());

    let report = reconciler.run_pass("org/repo").await.expect("pass failed");

    assert_eq!(fx.oracle.queries(), vec!["org/repo"]);
    assert_eq!(
        fx.namespaces.delete_calls(),
        vec![vec!["circleci-4702".to_string()]]
    );
    assert_eq!(
        fx.vms.delete_calls(),
        vec![vec!["condor-circleci-4702".to_string()]]
    );
    assert_eq!(
        fx.releases.delete_calls(),
        vec![vec![
            "cloud-testing-circleci-4706".to_string(),
            "cloud-testing-circleci-4707".to_string(),
            "condor-service-circleci-4702".to_string(),
            "condor-service-circleci-4705".to_string(),
            "h-celery-circleci-4705".to_string(),
            "h-celery-circleci-4710".to_string(),
        ]]
    );
    assert!(!report.dry_run);
    assert_eq!(report.plan.len(), 8);
}

#[tokio::test]
async fn test_namespace_plan_skips_system_and_unmatched() {
    let fx = Fixture::new(&["123", "4701"]);
    let report = fx
        .reconciler(ReaperConfig::default().with_dry_run(true))
        .run_pass("org/repo")
        .await
        .unwrap();

    assert_eq!(
        report.plan.targets(ResourceKind::Namespace),
        vec!["circleci-4702"]
    );
    for name in ["default", "kube-system", "kube-public", "123"] {
        assert!(!report.plan.contains(ResourceKind::Namespace, name));
    }
}

#[tokio::test]
async fn test_release_plan_matches_any_chart_name() {
    let releases = Arc::new(MemoryBackend::with_names(
        ResourceKind::Release,
        &[
            "cloud-testing-circleci-4706",
            "h-celery-circleci-4701",
            "h-celery-circleci-4710",
        ],
    ));
    let reconciler = Reconciler::new(
        ReaperConfig::default(),
        vec![releases.clone() as Arc<dyn ResourceBackend>],
        Arc::new(MemoryOracle::running(&["4701", "4702"])),
    )
    .unwrap();

    let report = reconciler.run_pass("org/repo").await.unwrap();
    assert_eq!(
        report.plan.targets(ResourceKind::Release),
        vec!["cloud-testing-circleci-4706", "h-celery-circleci-4710"]
    );
    assert_eq!(releases.names(), vec!["h-celery-circleci-4701"]);
}

#[tokio::test]
async fn test_inventories_are_taken_before_oracle_query() {
    let fx = Fixture::new(&["4701"]);
    fx.reconciler(ReaperConfig::default().with_dry_run(true))
        .run_pass("org/repo")
        .await
        .unwrap();

    assert_eq!(
        fx.journal(),
        vec!["list:namespace", "list:vm", "list:release", "oracle"]
    );
}

#[tokio::test]
async fn test_deletions_run_release_namespace_vm() {
    let fx = Fixture::new(&[]);
    fx.reconciler(ReaperConfig::default())
        .run_pass("org/repo")
        .await
        .unwrap();

    let deletes: Vec<String> = fx
        .journal()
        .into_iter()
        .filter(|e| e.starts_with("delete:"))
        .collect();
    assert_eq!(
        deletes,
        vec!["delete:release", "delete:namespace", "delete:vm"]
    );
}

#[tokio::test]
async fn test_dry_run_plans_identically_but_deletes_nothing() {
    let real = Fixture::new(&["123", "4701"]);
    let dry = Fixture::new(&["123", "4701"]);

    let real_report = real
        .reconciler(ReaperConfig::default())
        .run_pass("org/repo")
        .await
        .unwrap();
    let dry_report = dry
        .reconciler(ReaperConfig::default().with_dry_run(true))
        .run_pass("org/repo")
        .await
        .unwrap();

    assert_eq!(real_report.plan, dry_report.plan);
    assert!(dry_report.dry_run);
    assert!(dry.namespaces.delete_calls().is_empty());
    assert!(dry.vms.delete_calls().is_empty());
    assert!(dry.releases.delete_calls().is_empty());
}

#[tokio::test]
async fn test_rerun_with_unchanged_state_yields_same_plan() {
    let fx = Fixture::new(&["123", "4701"]);
    let reconciler = fx.reconciler(ReaperConfig::default().with_dry_run(true));

    let first = reconciler.run_pass("org/repo").await.unwrap();
    let second = reconciler.run_pass("org/repo").await.unwrap();
    assert_eq!(first.plan, second.plan);
    assert_ne!(first.pass_id, second.pass_id);
}

#[tokio::test]
async fn test_second_pass_after_deletion_is_empty() {
    let fx = Fixture::new(&["123", "4701"]);
    let reconciler = fx.reconciler(ReaperConfig::default());

    reconciler.run_pass("org/repo").await.unwrap();
    let second = reconciler.run_pass("org/repo").await.unwrap();
    assert!(second.plan.is_empty());
}

#[tokio::test]
async fn test_all_builds_active_plans_nothing() {
    let fx = Fixture::new(&["4701", "4702", "4705", "4706", "4707", "4710"]);
    let report = fx
        .reconciler(ReaperConfig::default())
        .run_pass("org/repo")
        .await
        .unwrap();

    assert!(report.plan.is_empty());
    assert!(fx.namespaces.delete_calls().is_empty());
    assert!(fx.vms.delete_calls().is_empty());
    assert!(fx.releases.delete_calls().is_empty());
}

#[tokio::test]
async fn test_unexpected_oracle_response_aborts_without_deleting() {
    let fx = Fixture::new(&[]);
    fx.oracle
        .set_payload(json!({"message": "You must log in first"}));

    let err = fx
        .reconciler(ReaperConfig::default())
        .run_pass("org/repo")
        .await
        .unwrap_err();

    match err {
        ReaperError::UnexpectedOracleResponse { payload } => {
            assert!(payload.contains("You must log in first"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fx.namespaces.delete_calls().is_empty());
    assert!(fx.vms.delete_calls().is_empty());
    assert!(fx.releases.delete_calls().is_empty());
}

#[tokio::test]
async fn test_namespace_delete_failure_stops_before_vms() {
    let journal: CallLog = Arc::new(Mutex::new(Vec::new()));
    let releases = Arc::new(MemoryBackend::with_names(
        ResourceKind::Release,
        &["web-circleci-9"],
    ));
    let namespaces = Arc::new(
        MemoryBackend::with_names(ResourceKind::Namespace, &["circleci-9"])
            .failing_delete("namespaces \"circleci-9\" is forbidden")
            .journaled(journal),
    );
    let vms = Arc::new(MemoryBackend::with_names(
        ResourceKind::Vm,
        &["condor-circleci-9"],
    ));
    let reconciler = Reconciler::new(
        ReaperConfig::default(),
        vec![
            namespaces.clone() as Arc<dyn ResourceBackend>,
            vms.clone() as Arc<dyn ResourceBackend>,
            releases.clone() as Arc<dyn ResourceBackend>,
        ],
        Arc::new(MemoryOracle::running(&[])),
    )
    .unwrap();

    let err = reconciler.run_pass("org/repo").await.unwrap_err();
    assert!(matches!(
        err,
        ReaperError::DeletionFailed {
            kind: ResourceKind::Namespace,
            ..
        }
    ));
    assert_eq!(releases.delete_calls().len(), 1);
    assert!(releases.names().is_empty());
    assert_eq!(namespaces.delete_calls().len(), 1);
    assert!(vms.delete_calls().is_empty());
}

#[tokio::test]
async fn test_listing_failure_aborts_before_oracle() {
    let journal: CallLog = Arc::new(Mutex::new(Vec::new()));
    let vms = Arc::new(
        MemoryBackend::new(ResourceKind::Vm, vec![])
            .failing_list("gcloud: not authenticated")
            .journaled(journal.clone()),
    );
    let oracle = Arc::new(MemoryOracle::running(&[]).journaled(journal.clone()));
    let reconciler = Reconciler::new(
        ReaperConfig::default(),
        vec![vms as Arc<dyn ResourceBackend>],
        oracle.clone(),
    )
    .unwrap();

    let err = reconciler.run_pass("org/repo").await.unwrap_err();
    assert!(matches!(
        err,
        ReaperError::Inventory {
            kind: ResourceKind::Vm,
            ..
        }
    ));
    assert!(oracle.queries().is_empty());
}

#[tokio::test]
async fn test_custom_prefix_only_touches_its_own_resources() {
    let namespaces = Arc::new(MemoryBackend::with_names(
        ResourceKind::Namespace,
        &["test-0", "circleci-0"],
    ));
    let reconciler = Reconciler::new(
        ReaperConfig::default().with_prefix("test"),
        vec![namespaces.clone() as Arc<dyn ResourceBackend>],
        Arc::new(MemoryOracle::running(&[])),
    )
    .unwrap();

    reconciler.run_pass("org/repo").await.unwrap();
    assert_eq!(namespaces.delete_calls(), vec![vec!["test-0".to_string()]]);
}
