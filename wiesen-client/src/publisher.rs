//! Fan-out seam between the core and the persistence/presentation world.
//!
//! The core only calls into [`Publisher`]; what happens on the other side
//! (widget refresh, live surface, notification delivery) is somebody else's
//! problem. [`SnapshotPublisher`] is the implementation the binary ships:
//! snapshot file plus log lines.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info, warn};

use crate::models::{ConnectionStatus, MonitoredField};
use crate::snapshot::{SnapshotError, SnapshotStore};

pub trait Publisher: Send + Sync {
    /// Durable key/value write. Seeds the cache on next startup and feeds
    /// out-of-process readers. Best-effort: the caller logs failures and
    /// moves on.
    fn persist(
        &self,
        field: MonitoredField,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<(), SnapshotError>;

    /// Connection status indicator update.
    fn on_connection_state_changed(&self, status: &ConnectionStatus);

    /// User-facing low-battery alert.
    fn on_alert(&self, soc: f64);

    /// Push the latest triple to any glanceable surface.
    fn refresh_live_surface(
        &self,
        soc: Option<f64>,
        solar_power: Option<f64>,
        battery_power: Option<f64>,
    );
}

pub struct SnapshotPublisher {
    store: SnapshotStore,
}

impl SnapshotPublisher {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }
}

impl fmt::Debug for SnapshotPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotPublisher")
            .field("path", &self.store.path())
            .finish()
    }
}

impl Publisher for SnapshotPublisher {
    fn persist(
        &self,
        field: MonitoredField,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<(), SnapshotError> {
        self.store.persist(field, value, observed_at)
    }

    fn on_connection_state_changed(&self, status: &ConnectionStatus) {
        info!(status = %status, "connection state changed");
    }

    fn on_alert(&self, soc: f64) {
        // Fixed title/body template; delivery mechanics live outside the core.
        warn!("Battery alarm: state of charge at {soc:.0}%");
    }

    fn refresh_live_surface(
        &self,
        soc: Option<f64>,
        solar_power: Option<f64>,
        battery_power: Option<f64>,
    ) {
        debug!(?soc, ?solar_power, ?battery_power, "live surface refresh requested");
    }
}
