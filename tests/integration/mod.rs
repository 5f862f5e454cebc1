//! Integration test suite for jarflow
//!
//! End-to-end tests over a temporary repository checkout. Pull request stages run
//! against the in-memory hosting mock from `jarflow::test_utils`; the CLI tests run
//! the real binary with CI variables removed so no network call is ever made.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: binary exit codes and output for offline commands
//! - **descriptor**: handoff file to descriptor pull request
//! - **detect**: change classification over real git history
//! - **pipeline**: the combined run with a fake container tool
//! - **scan**: manifest scan and recipe pull request idempotency

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod descriptor;
mod detect;
mod pipeline;
mod scan;

use jarflow::config::{ConfigFile, ConfigOverrides, EnvSource, PipelineConfig};
use jarflow::hosting::HostingApi;
use jarflow::publisher::PrPublisher;
use jarflow::test_utils::fixtures;
use jarflow::utils::backoff::RetryPolicy;

/// Commit id the tests pretend CI checked out.
pub const COMMIT: &str = "abc1234def567890abc1234def567890abc12345";

/// Resolved configuration for a [`common::TestRepo`], with fixed environment.
pub fn config_for(repo: &common::TestRepo) -> PipelineConfig {
    config_at_commit(repo, COMMIT)
}

/// As [`config_for`], for a run that CI started at `commit`.
pub fn config_at_commit(repo: &common::TestRepo, commit: &str) -> PipelineConfig {
    let overrides = ConfigOverrides {
        repo_root: Some(repo.path().to_path_buf()),
        handoff_file: Some(repo.handoff_path()),
        report_file: Some(repo.report_path()),
        registry_host: Some(fixtures::REGISTRY.to_string()),
        ..ConfigOverrides::default()
    };
    let env = EnvSource::from_pairs([("CIRCLE_SHA1", commit)]);
    PipelineConfig::resolve(overrides, ConfigFile::default(), &env)
}

pub fn publisher<H: HostingApi>(api: &H) -> PrPublisher<'_, H> {
    PrPublisher::new(api, "acme/nifi", "main").with_retry_policy(RetryPolicy::immediate())
}
