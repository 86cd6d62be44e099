//! Connection supervisor: owns the single broker connection and the
//! event-loop task that drives it.
//!
//! Discipline: at most one connection attempt in flight, tracked by an
//! atomic flag, so overlapping triggers (manual + watchdog) collapse into
//! one attempt. A session generation makes superseded event loops inert,
//! so a forced disconnect can never race a stale callback into the shared
//! status. Neither `connect` nor `disconnect` blocks on the network; the
//! outcome of an attempt always arrives through the event loop.

use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::config::{MqttConf, TopicsConf};
use crate::health::HealthTracker;
use crate::models::ConnectionStatus;
use crate::publisher::Publisher;
use crate::router::MessageRouter;

#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    config: MqttConf,
    topics: TopicsConf,
    router: MessageRouter,
    publisher: Arc<dyn Publisher>,
    health: HealthTracker,
    status: Mutex<ConnectionStatus>,
    /// The in-flight guard. Set by `connect`, cleared when the attempt
    /// resolves (ConnAck, rejection, transport error) or on any disconnect.
    connecting: AtomicBool,
    /// Bumped on every connect and disconnect; event loops carry the value
    /// they were spawned with and go inert once it no longer matches.
    generation: AtomicU64,
    attempts: AtomicU64,
    client: Mutex<Option<AsyncClient>>,
}

impl ConnectionSupervisor {
    pub fn new(
        config: MqttConf,
        topics: TopicsConf,
        router: MessageRouter,
        publisher: Arc<dyn Publisher>,
        health: HealthTracker,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                config,
                topics,
                router,
                publisher,
                health,
                status: Mutex::new(ConnectionStatus::Idle),
                connecting: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                attempts: AtomicU64::new(0),
                client: Mutex::new(None),
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.status.lock(), ConnectionStatus::Connected)
    }

    /// Whether a connection attempt is currently unresolved.
    pub fn attempt_in_flight(&self) -> bool {
        self.inner.connecting.load(Ordering::Acquire)
    }

    /// Connection attempts issued so far (diagnostics).
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::Relaxed)
    }

    /// Begin a connection attempt. No-op while a previous attempt is still
    /// unresolved; returns immediately either way.
    pub fn connect(&self) {
        if self
            .inner
            .connecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("connect requested while an attempt is in flight, ignoring");
            return;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.attempts.fetch_add(1, Ordering::Relaxed);
        self.set_status_if_current(generation, ConnectionStatus::Connecting);

        let mut options = MqttOptions::new(
            self.inner.config.client_id(),
            &self.inner.config.host,
            self.inner.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.inner.config.keep_alive_secs));
        options.set_clean_session(self.inner.config.clean_session);
        if let (Some(user), Some(pass)) = (&self.inner.config.username, &self.inner.config.password)
        {
            options.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(options, 10);
        *self.inner.client.lock() = Some(client.clone());

        info!(
            host = %self.inner.config.host,
            port = self.inner.config.port,
            generation,
            "starting connection attempt"
        );
        let supervisor = self.clone();
        task::spawn(async move { supervisor.run_event_loop(client, eventloop, generation).await });
    }

    /// Tear the connection down. Idempotent and safe at any time: always
    /// invalidates the outstanding attempt and clears the in-flight flag, so
    /// a wedged connect can never suppress a later one.
    pub async fn disconnect(&self) {
        // Generation bump and status write share one critical section on the
        // status lock, so a superseded event loop can never slip a stale
        // status write in between.
        let changed = {
            let mut status = self.inner.status.lock();
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            if *status == ConnectionStatus::Disconnected {
                false
            } else {
                *status = ConnectionStatus::Disconnected;
                true
            }
        };
        self.inner.connecting.store(false, Ordering::Release);
        let client = self.inner.client.lock().take();
        if let Some(client) = client {
            // Best effort: the event loop may already be gone.
            let _ = client.disconnect().await;
        }
        if changed {
            self.inner
                .publisher
                .on_connection_state_changed(&ConnectionStatus::Disconnected);
        }
    }

    /// Forced teardown-then-reconnect, the watchdog's recovery primitive.
    /// Always disconnect first and let the transport settle: reconnecting
    /// over a half-open socket is the failure mode being guarded against.
    pub async fn force_reconnect(&self, settle_delay: Duration) {
        self.inner.health.record_reconnect();
        self.disconnect().await;
        tokio::time::sleep(settle_delay).await;
        self.connect();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::Acquire) == generation
    }

    /// Status write on behalf of session `generation`. The generation check
    /// and the write share the status lock with `disconnect`'s bump, so a
    /// superseded event loop drops its write instead of overwriting the live
    /// status. Returns false when the write was dropped.
    fn set_status_if_current(&self, generation: u64, next: ConnectionStatus) -> bool {
        let changed = {
            let mut status = self.inner.status.lock();
            if self.inner.generation.load(Ordering::Acquire) != generation {
                return false;
            }
            if *status == next {
                false
            } else {
                *status = next.clone();
                true
            }
        };
        if changed {
            self.inner.publisher.on_connection_state_changed(&next);
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn set_status(&self, next: ConnectionStatus) {
        *self.inner.status.lock() = next;
    }

    async fn run_event_loop(self, client: AsyncClient, mut eventloop: EventLoop, generation: u64) {
        loop {
            let event = eventloop.poll().await;
            if !self.is_current(generation) {
                debug!(generation, "event loop superseded, shutting down");
                return;
            }
            match event {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        self.on_connected(&client, generation).await;
                    } else {
                        self.on_rejected(ack.code, generation);
                        return;
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    self.inner.router.handle(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    self.on_transport_error(&e, generation);
                    if !self.inner.config.auto_reconnect {
                        return;
                    }
                    // Transport-level retry; the watchdog supersedes this
                    // but both may coexist.
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }

    async fn on_connected(&self, client: &AsyncClient, generation: u64) {
        self.inner.connecting.store(false, Ordering::Release);
        if !self.set_status_if_current(generation, ConnectionStatus::Connected) {
            // Superseded mid-handshake; do not subscribe on a dead session.
            return;
        }
        for (topic, field) in self.inner.topics.all() {
            match client.subscribe(topic, QoS::AtLeastOnce).await {
                Ok(()) => debug!(topic, field = %field, "subscribed"),
                Err(e) => warn!(topic, error = %e, "subscribe failed"),
            }
        }
    }

    fn on_rejected(&self, code: ConnectReturnCode, generation: u64) {
        self.inner.connecting.store(false, Ordering::Release);
        let reason = format!("{code:?}");
        warn!(reason = %reason, "broker rejected connection");
        self.inner.health.record_error(&reason);
        self.set_status_if_current(generation, ConnectionStatus::Failed(reason));
    }

    fn on_transport_error(&self, e: &rumqttc::ConnectionError, generation: u64) {
        self.inner.connecting.store(false, Ordering::Release);
        error!(error = %e, "transport dropped");
        self.inner.health.record_error(e.to_string());
        self.set_status_if_current(generation, ConnectionStatus::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmState;
    use crate::models::ValueCache;
    use crate::state::new_state;
    use crate::test_support::MockPublisher;

    /// Supervisor pointed at an unreachable broker; the in-flight guard and
    /// status transitions are what is under test, never a real handshake.
    fn test_supervisor() -> (ConnectionSupervisor, MockPublisher) {
        let config = MqttConf {
            host: "127.0.0.1".into(),
            port: 1,
            ..MqttConf::default()
        };
        let publisher = MockPublisher::new();
        let router = MessageRouter::new(
            TopicsConf::default(),
            new_state(ValueCache::new()),
            new_state(AlarmState::new(false, 20.0)),
            Arc::new(publisher.clone()),
        );
        let supervisor = ConnectionSupervisor::new(
            config,
            TopicsConf::default(),
            router,
            Arc::new(publisher.clone()),
            HealthTracker::new(),
        );
        (supervisor, publisher)
    }

    #[tokio::test]
    async fn double_connect_collapses_into_one_attempt() {
        let (supervisor, _publisher) = test_supervisor();

        // No await between the calls: the second must hit the in-flight
        // guard before the spawned event loop gets a chance to run.
        supervisor.connect();
        supervisor.connect();

        assert_eq!(supervisor.attempts(), 1);
        assert!(supervisor.attempt_in_flight());
        assert_eq!(supervisor.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn disconnect_clears_a_stuck_in_flight_flag() {
        let (supervisor, _publisher) = test_supervisor();

        supervisor.connect();
        assert!(supervisor.attempt_in_flight());

        supervisor.disconnect().await;
        assert!(!supervisor.attempt_in_flight());
        assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);

        // A fresh connect is not suppressed.
        supervisor.connect();
        assert_eq!(supervisor.attempts(), 2);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (supervisor, _publisher) = test_supervisor();

        supervisor.disconnect().await;
        supervisor.disconnect().await;

        assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
        assert_eq!(supervisor.attempts(), 0);
    }

    #[tokio::test]
    async fn forced_reconnect_cycles_stay_bounded() {
        let (supervisor, _publisher) = test_supervisor();

        // Eight watchdog-style cycles: exactly one attempt each, never an
        // accumulation of concurrent in-flight attempts.
        for cycle in 1..=8u64 {
            supervisor.force_reconnect(Duration::from_millis(1)).await;
            assert_eq!(supervisor.attempts(), cycle);
        }
    }

    #[tokio::test]
    async fn a_superseded_session_cannot_write_status() {
        let (supervisor, publisher) = test_supervisor();

        supervisor.connect();
        let stale = supervisor.inner.generation.load(Ordering::Acquire);
        supervisor.disconnect().await;

        // A callback still carrying the old generation must drop its write.
        assert!(!supervisor.set_status_if_current(stale, ConnectionStatus::Connected));
        assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
        assert!(!supervisor.is_connected());

        // The live session writes through as usual.
        supervisor.connect();
        let live = supervisor.inner.generation.load(Ordering::Acquire);
        assert!(supervisor.set_status_if_current(live, ConnectionStatus::Connected));
        assert_eq!(supervisor.status(), ConnectionStatus::Connected);

        assert_eq!(
            publisher.status_changes(),
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Disconnected,
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn status_transitions_are_published() {
        let (supervisor, publisher) = test_supervisor();

        supervisor.connect();
        supervisor.disconnect().await;

        let changes = publisher.status_changes();
        assert_eq!(
            changes,
            vec![ConnectionStatus::Connecting, ConnectionStatus::Disconnected]
        );
    }
}
