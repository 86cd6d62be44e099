//! Connection watchdog: periodic poll-and-reset.
//!
//! Catches attempts that neither succeeded nor failed in time (silently
//! dead sockets). Each tick inspects the supervisor status; anything other
//! than Connected gets a forced teardown, a short settle delay, then a
//! fresh connect. Deliberately aggressive and stateless, no backoff: the
//! target network is low-churn and bounded-latency.

use std::time::Duration;
use tokio::task;
use tracing::info;

use crate::config::WatchdogConf;
use crate::mqtt::ConnectionSupervisor;

pub struct Watchdog {
    supervisor: ConnectionSupervisor,
    config: WatchdogConf,
}

impl Watchdog {
    pub fn new(supervisor: ConnectionSupervisor, config: WatchdogConf) -> Self {
        Self { supervisor, config }
    }

    /// One health inspection. Public so tests can drive ticks directly.
    pub async fn tick(&self) {
        if self.supervisor.is_connected() {
            return;
        }
        info!(status = %self.supervisor.status(), "watchdog: connection not healthy, forcing reconnect");
        self.supervisor
            .force_reconnect(Duration::from_millis(self.config.settle_delay_ms))
            .await;
    }

    pub fn spawn(self) -> task::JoinHandle<()> {
        task::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(self.config.interval_secs));
            // The first interval tick fires immediately; consume it so the
            // initial connect attempt gets a full period to resolve.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}
