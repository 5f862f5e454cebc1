//! Test utilities for jarflow
//!
//! Stand-ins for the two external systems the pipeline drives, plus fixtures:
//!
//! - [`MockHostingApi`] - in-memory repository host that records every call and can
//!   inject one-shot failures
//! - [`FakeContainerTool`] - records builds and pushes without running docker
//! - [`fixtures`] - a small repository layout (recipe, manifests, task definition)
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use jarflow::publisher::PrPublisher;
//! use jarflow::test_utils::MockHostingApi;
//!
//! let api = MockHostingApi::new();
//! let publisher = PrPublisher::new(&api, "acme/nifi", "main");
//! ```

pub mod container;
pub mod fixtures;
pub mod hosting;

pub use container::FakeContainerTool;
pub use hosting::{MockCall, MockHostingApi, MockPull};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` if given, else `RUST_LOG`; with neither, tests stay silent.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
