//! Wiesenbatterie telemetry client core.
//!
//! A single persistent MQTT connection feeds three sensor topics
//! (state of charge, solar power, battery power) into a last-known-value
//! cache that every consumer reads. The modules here are the
//! connection-lifecycle and data-freshness engine:
//! - [`mqtt`]: connection supervisor (one attempt in flight, ever)
//! - [`watchdog`]: periodic force-reconnect when the link is not healthy
//! - [`router`]: inbound message dispatch into cache + alarm + publisher
//! - [`alarm`]: low-battery latch with hysteresis
//! - [`publisher`]: the seam to persistence and presentation surfaces

pub mod alarm;
pub mod config;
pub mod health;
pub mod models;
pub mod mqtt;
pub mod publisher;
pub mod router;
pub mod snapshot;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watchdog;
