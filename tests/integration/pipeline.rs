//! The combined run: scan alongside build, descriptor after build.

use crate::common::{FileAssert, TestRepo};
use crate::{config_at_commit, config_for, publisher};
use jarflow::core::JarflowError;
use jarflow::descriptor::DescriptorOutcome;
use jarflow::pipeline::{ScanOutcome, build_stage, run};
use jarflow::publisher::PublishOutcome;
use jarflow::test_utils::{FakeContainerTool, MockHostingApi, fixtures};

const IMAGE: &str =
    "123456789012.dkr.ecr.ap-northeast-1.amazonaws.com/apache-nifi-with-custom-jars-repo";

#[tokio::test]
async fn test_full_run_opens_both_pull_requests() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    let config = config_for(&repo);
    let api = MockHostingApi::new();
    let tool = FakeContainerTool::new();

    let report = run(&config, &publisher(&api), &tool, None).await;

    assert!(report.failed_stages().is_empty(), "{report:?}");
    assert_eq!(
        tool.pushed(),
        vec![format!("{IMAGE}:abc1234"), format!("{IMAGE}:latest")]
    );
    let builds = tool.builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].recipe, repo.path().join("custom_nifi/Dockerfile"));

    let titles: Vec<String> = api.open_pulls().into_iter().map(|p| p.title).collect();
    assert_eq!(
        titles.len(),
        2,
        "one recipe and one descriptor pull request: {titles:?}"
    );
    assert!(matches!(report.descriptor, Ok(DescriptorOutcome::Published { .. })));
    FileAssert::not_exists(repo.handoff_path());
}

#[tokio::test]
async fn test_push_failure_leaves_no_handoff() {
    let repo = TestRepo::new().unwrap();
    let config = config_for(&repo);
    let api = MockHostingApi::new();
    let tool = FakeContainerTool::new().failing_push();

    let report = run(&config, &publisher(&api), &tool, None).await;

    assert_eq!(report.failed_stages(), vec!["build", "descriptor"]);
    assert!(matches!(report.scan, Ok(ScanOutcome::NothingToAdd)));
    FileAssert::not_exists(repo.handoff_path());
    assert!(api.open_pulls().is_empty());
}

#[tokio::test]
async fn test_closed_gate_still_builds_and_deploys() {
    let repo = TestRepo::with_history().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    repo.write_file("README.md", "# nifi\n").unwrap();
    repo.git.commit_all("Request driver").unwrap();
    repo.write_file("README.md", "# nifi pipeline\n").unwrap();
    repo.git.commit_all("Docs").unwrap();

    let config = config_for(&repo);
    let api = MockHostingApi::new();
    let tool = FakeContainerTool::new();

    let report = run(&config, &publisher(&api), &tool, Some(None)).await;

    assert!(matches!(report.scan, Ok(ScanOutcome::GateClosed(_))));
    assert!(report.build.is_ok());
    let pulls = api.open_pulls();
    assert_eq!(pulls.len(), 1);
    assert_eq!(pulls[0].title, "[Auto] Update NiFi Docker image to abc1234");
}

#[tokio::test]
async fn test_build_without_push_skips_handoff() {
    let repo = TestRepo::new().unwrap();
    let config = config_for(&repo);
    let tool = FakeContainerTool::new();

    let artifact = build_stage(&config, &tool, false).await.unwrap();

    assert!(!artifact.pushed);
    assert_eq!(artifact.reference(), format!("{IMAGE}:abc1234"));
    assert!(tool.pushed().is_empty());
    FileAssert::not_exists(repo.handoff_path());
}

#[tokio::test]
async fn test_failed_build_ignores_stale_handoff_from_earlier_run() {
    let repo = TestRepo::new().unwrap();
    std::fs::write(repo.handoff_path(), "1111111\n").unwrap();
    let config = config_for(&repo);
    let api = MockHostingApi::new();
    let tool = FakeContainerTool::new().failing_build();

    let report = run(&config, &publisher(&api), &tool, None).await;

    assert_eq!(report.failed_stages(), vec!["build", "descriptor"]);
    let err = report.descriptor.unwrap_err();
    assert!(matches!(err.downcast_ref::<JarflowError>(), Some(JarflowError::MissingImageTag { .. })));
    assert!(api.open_pulls().is_empty());
    FileAssert::not_exists(repo.handoff_path());
}

#[tokio::test]
async fn test_two_runs_before_merge_open_one_recipe_and_two_descriptor_pulls() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    let api = MockHostingApi::new();
    let tool = FakeContainerTool::new();

    let first = config_at_commit(&repo, "abc1234def567890abc1234def567890abc12345");
    let report = run(&first, &publisher(&api), &tool, None).await;
    assert!(report.failed_stages().is_empty(), "{report:?}");

    // nothing merged, no new manifests, a new commit
    let second = config_at_commit(&repo, "def5678abc1234def567890abc1234def5678901");
    let report = run(&second, &publisher(&api), &tool, None).await;
    assert!(report.failed_stages().is_empty(), "{report:?}");
    assert!(matches!(
        report.scan,
        Ok(ScanOutcome::Published {
            outcome: PublishOutcome::SkippedAlreadyOpen { .. },
            ..
        })
    ));

    let titles: Vec<String> = api.all_pulls().into_iter().map(|p| p.title).collect();
    let recipe_pulls = titles.iter().filter(|t| t.starts_with("[Auto] Add JAR(s)")).count();
    assert_eq!(recipe_pulls, 1, "{titles:?}");
    let mut descriptor_pulls: Vec<&str> = titles
        .iter()
        .map(String::as_str)
        .filter(|t| t.starts_with("[Auto] Update NiFi Docker image"))
        .collect();
    descriptor_pulls.sort();
    assert_eq!(
        descriptor_pulls,
        vec![
            "[Auto] Update NiFi Docker image to abc1234",
            "[Auto] Update NiFi Docker image to def5678"
        ]
    );
}
