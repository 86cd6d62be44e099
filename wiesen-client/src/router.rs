//! Inbound message dispatch.
//!
//! One entry point, [`MessageRouter::handle`]: resolve the topic to a
//! monitored field, coerce the payload to a number, stamp it with arrival
//! time, write the cache, run the alarm check for state of charge and fan
//! out to the publisher. Inbound data never raises.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::TopicsConf;
use crate::models::{MonitoredField, ValueSample};
use crate::publisher::Publisher;
use crate::state::{SharedAlarm, SharedCache};

pub struct MessageRouter {
    topics: TopicsConf,
    cache: SharedCache,
    alarm: SharedAlarm,
    publisher: Arc<dyn Publisher>,
}

impl MessageRouter {
    pub fn new(
        topics: TopicsConf,
        cache: SharedCache,
        alarm: SharedAlarm,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self { topics, cache, alarm, publisher }
    }

    /// Handle one inbound (topic, payload) pair. Unknown topics are ignored;
    /// malformed payloads coerce to 0.0.
    pub fn handle(&self, topic: &str, payload: &[u8]) {
        let Some(field) = self.topics.resolve(topic) else {
            debug!(topic, "ignoring message on unmonitored topic");
            return;
        };

        let value = parse_payload(field, payload);
        let sample = ValueSample::new(field, value);
        let observed_at = sample.observed_at;
        self.cache.lock().insert(sample);

        if field == MonitoredField::StateOfCharge {
            let event = self.alarm.lock().observe(value);
            if let Some(event) = event {
                info!(soc = event.soc, threshold = event.threshold_percent, "alarm threshold crossed");
                self.publisher.on_alert(event.soc);
            }
        }

        if let Err(e) = self.publisher.persist(field, value, observed_at) {
            warn!(field = %field, error = %e, "snapshot persist failed, cache updated in memory only");
        }

        // At most one refresh per inbound message.
        let (soc, solar, battery) = self.cache.lock().triple();
        self.publisher.refresh_live_surface(soc, solar, battery);
    }
}

/// Payloads are plain numeric strings. Anything that fails the parse is
/// coerced to 0.0 and logged; it is never propagated as an error.
fn parse_payload(field: MonitoredField, payload: &[u8]) -> f64 {
    let text = String::from_utf8_lossy(payload);
    match text.trim().parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            warn!(field = %field, payload = %text, "malformed payload, coercing to 0.0");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmState;
    use crate::models::ValueCache;
    use crate::state::new_state;
    use crate::test_support::MockPublisher;

    fn router_with(armed: bool) -> (MessageRouter, SharedCache, MockPublisher) {
        let cache = new_state(ValueCache::new());
        let alarm = new_state(AlarmState::new(armed, 20.0));
        let publisher = MockPublisher::new();
        let router = MessageRouter::new(
            TopicsConf::default(),
            cache.clone(),
            alarm,
            Arc::new(publisher.clone()),
        );
        (router, cache, publisher)
    }

    #[test]
    fn malformed_payloads_coerce_to_zero() {
        let (router, cache, publisher) = router_with(false);

        for payload in [&b"garbage"[..], &b""[..], &b"12,5"[..], &b"\xff\xfe"[..]] {
            router.handle("wiesenbatterie/solar", payload);
            assert_eq!(cache.lock().value(MonitoredField::SolarPower), Some(0.0));
        }
        assert_eq!(publisher.persisted().len(), 4);
    }

    #[test]
    fn unknown_topics_are_ignored() {
        let (router, cache, publisher) = router_with(true);

        router.handle("wiesenbatterie/voltage", b"12.8");

        assert!(cache.lock().is_empty());
        assert!(publisher.persisted().is_empty());
        assert!(publisher.live_refreshes().is_empty());
    }

    #[test]
    fn low_soc_updates_cache_and_fires_exactly_one_alert() {
        let (router, cache, publisher) = router_with(true);

        router.handle("wiesenbatterie/soc", b"17.5");

        let sample = cache.lock().get(MonitoredField::StateOfCharge).cloned().unwrap();
        assert_eq!(sample.display_value(), "17.5");
        assert_eq!(publisher.alerts(), vec![17.5]);

        // Staying low must not refire.
        router.handle("wiesenbatterie/soc", b"16.0");
        assert_eq!(publisher.alerts().len(), 1);
    }

    #[test]
    fn non_soc_fields_never_touch_the_alarm() {
        let (router, _cache, publisher) = router_with(true);

        router.handle("wiesenbatterie/solar", b"3.0");
        router.handle("wiesenbatterie/battery", b"-250");

        assert!(publisher.alerts().is_empty());
    }

    #[test]
    fn one_live_refresh_per_inbound_message() {
        let (router, _cache, publisher) = router_with(false);

        router.handle("wiesenbatterie/soc", b"55");
        router.handle("wiesenbatterie/solar", b"342");

        let refreshes = publisher.live_refreshes();
        assert_eq!(refreshes.len(), 2);
        assert_eq!(refreshes[1], (Some(55.0), Some(342.0), None));
    }

    #[test]
    fn persistence_failure_is_swallowed() {
        let (router, cache, publisher) = router_with(false);
        publisher.fail_persistence(true);

        router.handle("wiesenbatterie/soc", b"44");

        // Cache still updated in memory.
        assert_eq!(cache.lock().value(MonitoredField::StateOfCharge), Some(44.0));
        assert!(publisher.persisted().is_empty());
    }
}
