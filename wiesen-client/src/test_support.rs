//! Mock publisher for tests: records every call the core makes so tests can
//! assert on the fan-out without a broker or a filesystem.
//!
//! Lives in the client crate (behind the `test-support` feature) so the mock
//! implements the same `Publisher` trait instance the crate's own tests bound
//! against; `wiesen-devkit` re-exports it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::models::{ConnectionStatus, MonitoredField};
use crate::publisher::Publisher;
use crate::snapshot::SnapshotError;

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedValue {
    pub field: MonitoredField,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct MockPublisher {
    persisted: Arc<Mutex<Vec<PersistedValue>>>,
    status_changes: Arc<Mutex<Vec<ConnectionStatus>>>,
    alerts: Arc<Mutex<Vec<f64>>>,
    live_refreshes: Arc<Mutex<Vec<(Option<f64>, Option<f64>, Option<f64>)>>>,
    fail_persistence: Arc<Mutex<bool>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `persist` fail, to exercise the core's best-effort handling.
    pub fn fail_persistence(&self, fail: bool) {
        *self.fail_persistence.lock() = fail;
    }

    pub fn persisted(&self) -> Vec<PersistedValue> {
        self.persisted.lock().clone()
    }

    pub fn status_changes(&self) -> Vec<ConnectionStatus> {
        self.status_changes.lock().clone()
    }

    pub fn alerts(&self) -> Vec<f64> {
        self.alerts.lock().clone()
    }

    pub fn live_refreshes(&self) -> Vec<(Option<f64>, Option<f64>, Option<f64>)> {
        self.live_refreshes.lock().clone()
    }

    /// Reset everything recorded so far.
    pub fn clear(&self) {
        self.persisted.lock().clear();
        self.status_changes.lock().clear();
        self.alerts.lock().clear();
        self.live_refreshes.lock().clear();
    }
}

impl Publisher for MockPublisher {
    fn persist(
        &self,
        field: MonitoredField,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<(), SnapshotError> {
        if *self.fail_persistence.lock() {
            return Err(SnapshotError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "snapshot store unavailable",
            )));
        }
        self.persisted.lock().push(PersistedValue { field, value, observed_at });
        Ok(())
    }

    fn on_connection_state_changed(&self, status: &ConnectionStatus) {
        self.status_changes.lock().push(status.clone());
    }

    fn on_alert(&self, soc: f64) {
        self.alerts.lock().push(soc);
    }

    fn refresh_live_surface(
        &self,
        soc: Option<f64>,
        solar_power: Option<f64>,
        battery_power: Option<f64>,
    ) {
        self.live_refreshes.lock().push((soc, solar_power, battery_power));
    }
}
