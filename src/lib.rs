//! jarflow - JAR manifest to deployment automation
//!
//! jarflow keeps a container image recipe (a Dockerfile) in step with a directory of
//! JAR dependency manifests, and carries each resulting image through to the
//! deployment descriptor that runs it. Every change lands as a reviewable pull
//! request; nothing is pushed to the base branch directly.
//!
//! # Pipeline
//!
//! ```text
//!  commit ──> detect ──(manifest changed)──> scan ──> recipe PR
//!     │
//!     └────> build ──> push ──> handoff file ──> update-descriptor ──> descriptor PR
//! ```
//!
//! 1. **Detect** ([`detect`]) classifies the paths a commit touched as manifest
//!    changes, recipe changes or neither, and gates the downstream stages.
//! 2. **Scan** ([`manifest`], [`recipe`]) loads every manifest, compares it with the
//!    fetch directives already in the recipe and builds a patched recipe for the
//!    JARs that are missing. The diff is written as a JSON report.
//! 3. **Publish** ([`publisher`], [`hosting`]) opens one pull request per change set
//!    in a single commit. A pull request with the same title that is already open
//!    makes the run a no-op, so repeated CI runs never duplicate work.
//! 4. **Build** ([`image`]) builds the image tagged with the first seven characters
//!    of the commit id, pushes it together with `latest`, and writes the tag to the
//!    handoff file ([`handoff`]).
//! 5. **Update descriptor** ([`descriptor`]) rewrites the image tag in the
//!    deployment descriptor and publishes the result as a second pull request.
//!
//! [`pipeline`] wires these together; [`cli`] exposes each stage as a subcommand.
//!
//! # Manifest Format
//!
//! ```json
//! {
//!   "name": "mysql-connector-j-9.5.0.jar",
//!   "url": "https://repo1.maven.org/maven2/com/mysql/mysql-connector-j/9.5.0/mysql-connector-j-9.5.0.jar",
//!   "install_path": "/opt/nifi/nifi-current/lib/"
//! }
//! ```
//!
//! # Configuration
//!
//! Settings resolve in the order flag > environment > `jarflow.toml` > default.
//! The GitHub token is only ever read from the environment. See [`config`].
//!
//! # Supporting Modules
//!
//! - [`core`] - error taxonomy and operator-facing error messages
//! - [`constants`] - defaults, timeouts and environment variable names
//! - [`pattern`] - glob matching for manifest and recipe paths
//! - [`process`] - running `git` and `docker` with captured output
//! - [`utils`] - atomic file writes and retry with backoff

// Core functionality
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod pipeline;

// Stages
pub mod descriptor;
pub mod detect;
pub mod handoff;
pub mod image;
pub mod manifest;
pub mod recipe;

// Pull requests
pub mod hosting;
pub mod publisher;

// Supporting modules
pub mod pattern;
pub mod process;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
