//! Common test utilities for jarflow integration tests
//!
//! A [`TestRepo`] is a temporary git checkout laid out the way the pipeline
//! expects (Dockerfile, manifests directory, task definition). It can run the
//! `jarflow` binary against itself with CI variables stripped from the environment.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use jarflow::constants::env;
use jarflow::test_utils::fixtures;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Variables a CI runner may have set that would leak into tests.
const CI_VARIABLES: &[&str] = &[
    env::GITHUB_TOKEN,
    env::REPO_OWNER_OVERRIDE,
    env::REPO_NAME_OVERRIDE,
    env::CI_REPO_OWNER,
    env::CI_REPO_NAME,
    env::CI_COMMIT,
    env::AWS_ACCOUNT_ID,
    env::AWS_REGION,
    env::RECIPE_PATH,
    env::MANIFESTS_DIR,
    env::DESCRIPTOR_PATH,
    env::BASE_BRANCH,
    env::HANDOFF_PATH,
    env::REPORT_PATH,
    env::IMAGE_REPOSITORY,
    env::REGISTRY_HOST,
    env::API_URL,
    env::CONFIG_PATH,
    "RUST_LOG",
];

/// Git command builder for tests
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| format!("Failed to run git {}", args.join(" ")))?;
        anyhow::ensure!(
            output.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Initialize a repository on `main` with a test identity
    pub fn init(&self) -> Result<()> {
        self.git(&["init", "--initial-branch=main"])?;
        self.git(&["config", "user.email", "test@example.com"])?;
        self.git(&["config", "user.name", "Test User"])?;
        self.git(&["config", "commit.gpgsign", "false"])?;
        Ok(())
    }

    /// Stage everything and commit
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    pub fn head(&self) -> Result<String> {
        self.git(&["rev-parse", "HEAD"])
    }
}

/// A temporary repository checkout with the default pipeline layout
pub struct TestRepo {
    _temp_dir: TempDir,
    root: PathBuf,
    out: PathBuf,
    pub git: TestGit,
}

impl TestRepo {
    /// Layout only, no git history
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("repo");
        let out = temp_dir.path().join("out");
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&out)?;
        fixtures::write_repo(&root);

        Ok(Self {
            git: TestGit::new(&root),
            _temp_dir: temp_dir,
            root,
            out,
        })
    }

    /// Layout committed as the first commit of a fresh repository
    pub fn with_history() -> Result<Self> {
        let repo = Self::new()?;
        repo.git.init()?;
        repo.git.commit_all("Initial layout")?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Handoff file used by [`Self::jarflow`]; outside the checkout
    pub fn handoff_path(&self) -> PathBuf {
        self.out.join("image-tag.txt")
    }

    /// Diff report used by [`Self::jarflow`]
    pub fn report_path(&self) -> PathBuf {
        self.out.join("jar-diff-report.json")
    }

    pub fn write_manifest(&self, file_name: &str, content: &str) {
        fixtures::write_manifest(&self.root, file_name, content);
    }

    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn read(&self, relative: &str) -> String {
        let path = self.root.join(relative);
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
    }

    /// `jarflow` pointed at this checkout, with CI variables removed
    pub fn jarflow(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("jarflow").expect("jarflow binary is built");
        for var in CI_VARIABLES {
            cmd.env_remove(var);
        }
        cmd.env("NO_COLOR", "1")
            .current_dir(&self.root)
            .arg("--repo-root")
            .arg(&self.root)
            .arg("--registry-host")
            .arg(fixtures::REGISTRY)
            .arg("--handoff-file")
            .arg(self.handoff_path())
            .arg("--report-file")
            .arg(self.report_path());
        cmd
    }
}

/// File assertion helpers
pub struct FileAssert;

impl FileAssert {
    pub fn exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    pub fn not_exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(!path.exists(), "Expected file to not exist: {}", path.display());
    }

    pub fn contains(path: impl AsRef<Path>, expected: &str) {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
        assert!(
            content.contains(expected),
            "Expected {} to contain '{}'\nActual content:\n{}",
            path.display(),
            expected,
            content
        );
    }
}
