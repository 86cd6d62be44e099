//! Client health diagnostics: uptime, forced reconnects, last transport
//! error. Surfaced only through the log; there is no server surface here.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{info, warn};

use crate::mqtt::ConnectionSupervisor;
use crate::state::SharedCache;

#[derive(Debug, Serialize)]
pub struct ClientHealth {
    pub uptime_seconds: u64,
    pub connection_status: String,
    pub connect_attempts: u64,
    pub forced_reconnects: u32,
    pub last_error: Option<String>,
    pub fields_cached: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    forced_reconnects: Arc<AtomicU32>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            forced_reconnects: Arc::new(AtomicU32::new(0)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn record_reconnect(&self) {
        self.forced_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, error: impl Into<String>) {
        *self.last_error.lock() = Some(error.into());
    }

    pub fn forced_reconnects(&self) -> u32 {
        self.forced_reconnects.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn snapshot(&self, supervisor: &ConnectionSupervisor, cache: &SharedCache) -> ClientHealth {
        ClientHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            connection_status: supervisor.status().to_string(),
            connect_attempts: supervisor.attempts(),
            forced_reconnects: self.forced_reconnects(),
            last_error: self.last_error(),
            fields_cached: cache.lock().len() as u32,
        }
    }

    /// Periodic health summary in the log, every 60s.
    pub fn spawn_health_logger(
        &self,
        supervisor: ConnectionSupervisor,
        cache: SharedCache,
    ) -> task::JoinHandle<()> {
        let tracker = self.clone();
        task::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let health = tracker.snapshot(&supervisor, &cache);
                match serde_json::to_string(&health) {
                    Ok(payload) => info!(health = %payload, "client health"),
                    Err(e) => warn!(error = %e, "failed to serialize health"),
                }
            }
        })
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
