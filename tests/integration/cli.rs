//! The `jarflow` binary on commands that need no network or docker.

use crate::common::{FileAssert, TestRepo};
use jarflow::test_utils::fixtures;
use predicates::prelude::*;

#[test]
fn test_patch_recipe_updates_checkout() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);

    repo.jarflow()
        .arg("patch-recipe")
        .assert()
        .success()
        .stdout(predicate::str::contains("mysql-connector-j-9.5.0.jar"));

    let recipe = repo.read("custom_nifi/Dockerfile");
    assert!(recipe.contains("-o /opt/nifi/nifi-current/lib/mysql-connector-j-9.5.0.jar"));
    // new directives go above the marker
    let marker = recipe.find("NEW JARS WILL BE ADDED AUTOMATICALLY").unwrap();
    assert!(recipe.find("mysql-connector-j-9.5.0.jar").unwrap() < marker);
}

#[test]
fn test_patch_recipe_twice_is_stable() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);

    repo.jarflow().arg("patch-recipe").assert().success();
    let first = repo.read("custom_nifi/Dockerfile");
    repo.jarflow()
        .arg("patch-recipe")
        .assert()
        .success()
        .stdout(predicate::str::contains("already fetches every manifest"));

    assert_eq!(repo.read("custom_nifi/Dockerfile"), first);
}

#[test]
fn test_scan_dry_run_prints_patch_and_writes_report() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);

    repo.jarflow()
        .args(["scan", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mysql-connector-j-9.5.0.jar"))
        .stdout(predicate::str::contains("FROM apache/nifi:1.25.0"));

    FileAssert::contains(repo.report_path(), "\"action_required\": true");
    assert_eq!(repo.read("custom_nifi/Dockerfile"), fixtures::RECIPE);
}

#[test]
fn test_scan_without_token_fails_with_guidance() {
    let repo = TestRepo::new().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);

    repo.jarflow()
        .arg("scan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GITHUB_TOKEN"));
}

#[test]
fn test_update_descriptor_dry_run_with_explicit_tag() {
    let repo = TestRepo::new().unwrap();

    repo.jarflow()
        .args(["update-descriptor", "--dry-run", "--tag", "abc1234"])
        .assert()
        .success()
        .stdout(predicate::str::contains("apache-nifi-with-custom-jars-repo:abc1234"))
        .stdout(predicate::str::contains(":latest").not());

    assert_eq!(repo.read("ecs_task_definition.tf"), fixtures::TASK_DEFINITION);
}

#[test]
fn test_update_descriptor_dry_run_reads_handoff_without_consuming() {
    let repo = TestRepo::new().unwrap();
    std::fs::write(repo.handoff_path(), "def5678\n").unwrap();

    repo.jarflow()
        .args(["update-descriptor", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("apache-nifi-with-custom-jars-repo:def5678"));

    FileAssert::exists(repo.handoff_path());
}

#[test]
fn test_update_descriptor_without_handoff_fails() {
    let repo = TestRepo::new().unwrap();

    repo.jarflow()
        .args(["update-descriptor", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No image tag provided"));
}

#[test]
fn test_update_descriptor_rejects_malformed_tag() {
    let repo = TestRepo::new().unwrap();

    repo.jarflow()
        .args(["update-descriptor", "--dry-run", "--tag", "v1.2.3"])
        .assert()
        .code(1);
}

#[test]
fn test_detect_unknown_kind_is_fatal() {
    let repo = TestRepo::new().unwrap();

    repo.jarflow()
        .args(["detect", "--require", "bogus"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown change type 'bogus'"));
}

#[test]
fn test_detect_closed_gate_exits_two() {
    let repo = TestRepo::with_history().unwrap();
    repo.write_file("README.md", "# nifi\n").unwrap();
    repo.git.commit_all("Docs").unwrap();

    repo.jarflow()
        .args(["detect", "--require", "manifest"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("neither"));
}

#[test]
fn test_detect_json_output() {
    let repo = TestRepo::with_history().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    repo.git.commit_all("Request MySQL driver").unwrap();

    repo.jarflow()
        .args(["detect", "--json", "--require", "manifest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"manifest_changed\": true"));
}

#[test]
fn test_verify_token_without_token_fails() {
    let repo = TestRepo::new().unwrap();

    repo.jarflow()
        .arg("verify-token")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No GitHub token provided"));
}
