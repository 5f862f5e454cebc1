//! Manifest scan and the recipe pull request.

use crate::common::{FileAssert, TestRepo};
use crate::{config_for, publisher};
use jarflow::hosting::ApiError;
use jarflow::pipeline::{ScanOutcome, failed_recipe_path, plan_scan, scan_stage};
use jarflow::publisher::PublishOutcome;
use jarflow::test_utils::{MockCall, MockHostingApi, fixtures};

#[tokio::test]
async fn test_new_manifest_opens_single_recipe_pull_request() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    let config = config_for(&repo);
    let api = MockHostingApi::new();

    let outcome = scan_stage(&config, &publisher(&api), None).await.unwrap();

    let (added, outcome) = match outcome {
        ScanOutcome::Published {
            added,
            outcome,
        } => (added, outcome),
        other => panic!("expected a published change request, got {other:?}"),
    };
    assert_eq!(added, vec!["mysql-connector-j-9.5.0.jar"]);
    assert!(matches!(outcome, PublishOutcome::Created { number: 1, .. }));

    let pulls = api.open_pulls();
    assert_eq!(pulls.len(), 1);
    let pull = &pulls[0];
    assert_eq!(pull.title, "[Auto] Add JAR(s): mysql-connector-j-9.5.0.jar");
    assert_eq!(pull.base, "main");
    assert!(pull.head.starts_with("auto/add-jars-"));
    assert_eq!(pull.labels, vec!["automated", "jar-update"]);
    assert!(pull.body.contains("mysql-connector-j-9.5.0.jar"));

    // one commit carrying only the recipe, with postgres left as it was
    assert_eq!(pull.files.len(), 1);
    let recipe = &pull.files["custom_nifi/Dockerfile"];
    assert!(recipe.contains("mysql-connector-j-9.5.0.jar"));
    assert_eq!(recipe.matches("postgresql-42.7.1.jar\"").count(), 1);
    let commits = api.calls().into_iter().filter(|c| matches!(c, MockCall::CreateCommit { .. })).count();
    assert_eq!(commits, 1);

    // the checkout itself is untouched
    assert_eq!(repo.read("custom_nifi/Dockerfile"), fixtures::RECIPE);
}

#[tokio::test]
async fn test_repeated_scan_before_merge_is_idempotent() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    let config = config_for(&repo);
    let api = MockHostingApi::new();

    scan_stage(&config, &publisher(&api), None).await.unwrap();
    let second = scan_stage(&config, &publisher(&api), None).await.unwrap();

    assert!(matches!(
        second,
        ScanOutcome::Published {
            outcome: PublishOutcome::SkippedAlreadyOpen { number: 1, .. },
            ..
        }
    ));
    assert_eq!(api.all_pulls().len(), 1);
    assert_eq!(api.branches().len(), 2, "main plus one automation branch");
}

#[tokio::test]
async fn test_applied_manifests_need_no_pull_request() {
    let repo = TestRepo::new().unwrap();
    let config = config_for(&repo);
    let api = MockHostingApi::new();

    let outcome = scan_stage(&config, &publisher(&api), None).await.unwrap();

    assert_eq!(outcome, ScanOutcome::NothingToAdd);
    assert!(api.calls().is_empty());
    FileAssert::contains(repo.report_path(), "postgresql-42.7.1.jar");
}

#[test]
fn test_malformed_manifest_is_skipped_not_fatal() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("broken.json", "{ \"name\": ");
    repo.write_manifest("no-url.json", r#"{ "name": "x.jar", "install_path": "/opt/lib/" }"#);
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    let config = config_for(&repo);

    let plan = plan_scan(&config).unwrap();

    assert_eq!(plan.diff.new_names(), vec!["mysql-connector-j-9.5.0.jar"]);
    let mut skipped: Vec<String> = plan
        .diff
        .skipped
        .iter()
        .filter_map(|s| std::path::Path::new(&s.file).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    skipped.sort_unstable();
    assert_eq!(skipped, vec!["broken.json", "no-url.json"]);
}

#[tokio::test]
async fn test_rejected_token_saves_patched_recipe() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    let config = config_for(&repo);
    let api = MockHostingApi::new();
    api.fail_next("list_open_pulls", ApiError::Unauthorized("Bad credentials".into()));

    let err = scan_stage(&config, &publisher(&api), None).await.unwrap_err();

    assert!(format!("{err:#}").contains("acme/nifi"));
    FileAssert::contains(failed_recipe_path(&config), "mysql-connector-j-9.5.0.jar");
    assert!(api.all_pulls().is_empty());
}
