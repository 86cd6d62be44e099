//! wiesen-client entry point.
//!
//! Bootstrap order: env + logging, config, snapshot seed, then the three
//! long-lived tasks (connection supervisor event loop, watchdog, health
//! logger). Shutdown on ctrl-c with a clean disconnect.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use wiesen_client::alarm::AlarmState;
use wiesen_client::config;
use wiesen_client::health::HealthTracker;
use wiesen_client::models::ValueCache;
use wiesen_client::mqtt::ConnectionSupervisor;
use wiesen_client::publisher::{Publisher, SnapshotPublisher};
use wiesen_client::router::MessageRouter;
use wiesen_client::snapshot::SnapshotStore;
use wiesen_client::state::new_state;
use wiesen_client::watchdog::Watchdog;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wiesen_client=info".into()),
        )
        .init();

    info!("wiesen-client starting");
    let cfg = config::load_config().await;

    let store = SnapshotStore::new(cfg.snapshot.resolved_path());
    let cache = new_state(ValueCache::new());
    let seeded = store.load();
    if !seeded.is_empty() {
        info!(fields = seeded.len(), "seeded cache from snapshot");
        let mut cache = cache.lock();
        for sample in seeded {
            cache.insert(sample);
        }
    }

    let alarm = new_state(AlarmState::new(cfg.alarm.enabled, cfg.alarm.threshold_percent));
    let publisher: Arc<dyn Publisher> = Arc::new(SnapshotPublisher::new(store));
    let health = HealthTracker::new();

    let router = MessageRouter::new(
        cfg.topics.clone(),
        cache.clone(),
        alarm.clone(),
        publisher.clone(),
    );
    let supervisor = ConnectionSupervisor::new(
        cfg.mqtt.clone(),
        cfg.topics.clone(),
        router,
        publisher.clone(),
        health.clone(),
    );

    supervisor.connect();
    Watchdog::new(supervisor.clone(), cfg.watchdog.clone()).spawn();
    health.spawn_health_logger(supervisor.clone(), cache.clone());

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    supervisor.disconnect().await;
    Ok(())
}
