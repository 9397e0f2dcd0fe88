//! Internal helpers re-exported for integration tests.
//!
//! Exposes an in-memory [`StubTransport`] so cache flows can be driven
//! without a network, and [`capture_logs`] for asserting on `tracing`
//! output.
//!
//! Only compiled for unit tests and under the `test-support` feature, which
//! the crate's own integration tests enable through a dev-dependency.

mod logging;
mod transport;

pub use logging::capture_logs;
pub use transport::StubTransport;
