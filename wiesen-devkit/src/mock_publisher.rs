//! Mock publisher for tests: records every call the core makes so tests can
//! assert on the fan-out without a broker or a filesystem.
//!
//! The implementation lives in `wiesen_client::test_support` (behind the
//! client's `test-support` feature) so the mock and the client's own tests
//! share one `Publisher` trait instance; this module re-exports it.

pub use wiesen_client::test_support::{MockPublisher, PersistedValue};
