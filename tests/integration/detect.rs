//! Change classification over real git history.

use crate::common::TestRepo;
use crate::config_for;
use jarflow::detect::ChangeKind;
use jarflow::pipeline::detect_changes;
use jarflow::test_utils::fixtures;

#[tokio::test]
async fn test_manifest_commit_opens_manifest_gate() {
    let repo = TestRepo::with_history().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    repo.git.commit_all("Request MySQL driver").unwrap();

    let changes = detect_changes(&config_for(&repo), None).await.unwrap();

    assert!(changes.satisfies(ChangeKind::Manifest));
    assert!(!changes.satisfies(ChangeKind::Recipe));
    assert_eq!(changes.manifest_paths, vec!["custom_nifi/jars/mysql.json"]);
}

#[tokio::test]
async fn test_recipe_commit_opens_recipe_gate_only() {
    let repo = TestRepo::with_history().unwrap();
    repo.write_file("custom_nifi/Dockerfile", &format!("{}# tweak\n", fixtures::RECIPE)).unwrap();
    repo.git.commit_all("Tweak Dockerfile").unwrap();

    let changes = detect_changes(&config_for(&repo), None).await.unwrap();

    assert!(changes.satisfies(ChangeKind::Recipe));
    assert!(!changes.satisfies(ChangeKind::Manifest));
    assert!(changes.satisfies(ChangeKind::Any));
}

#[tokio::test]
async fn test_unrelated_commit_is_neither() {
    let repo = TestRepo::with_history().unwrap();
    repo.write_file("README.md", "# nifi\n").unwrap();
    repo.write_file("custom_nifi/jars/notes.txt", "not a manifest\n").unwrap();
    repo.git.commit_all("Docs").unwrap();

    let changes = detect_changes(&config_for(&repo), None).await.unwrap();

    assert!(changes.is_neither());
    assert_eq!(changes.to_string(), "neither");
}

#[tokio::test]
async fn test_explicit_range_spans_several_commits() {
    let repo = TestRepo::with_history().unwrap();
    let base = repo.git.head().unwrap();
    repo.write_manifest("mysql.json", fixtures::MYSQL_MANIFEST);
    repo.git.commit_all("Request MySQL driver").unwrap();
    repo.write_file("README.md", "# nifi\n").unwrap();
    repo.git.commit_all("Docs").unwrap();

    let config = config_for(&repo);
    let last_only = detect_changes(&config, None).await.unwrap();
    let range = format!("{base}..HEAD");
    let whole_push = detect_changes(&config, Some(&range)).await.unwrap();

    assert!(last_only.is_neither());
    assert!(whole_push.satisfies(ChangeKind::Manifest));
}

#[tokio::test]
async fn test_first_commit_lists_its_own_files() {
    let repo = TestRepo::with_history().unwrap();

    let changes = detect_changes(&config_for(&repo), Some("not-a-ref..HEAD")).await.unwrap();

    assert!(changes.manifest_changed);
    assert!(changes.recipe_changed);
}
