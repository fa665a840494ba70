//! Casework Testing Infrastructure
//!
//! Shared test doubles for the workflow crates: a scripted
//! [`MockTransport`] whose replies can be held open behind a [`Gate`] to
//! reproduce response races, a [`ControllableClock`], and JSON fixtures for
//! every record the server returns.
//!
//! ```toml
//! [dev-dependencies]
//! casework-testkit = { path = "../casework-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod clock;
pub mod fixtures;
pub mod transport;

pub use clock::ControllableClock;
pub use fixtures::*;
pub use transport::{Gate, MockTransport, RecordedCall, Reply};

/// Install a test-writer subscriber once per process.
///
/// Honors `RUST_LOG`; silent by default.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
