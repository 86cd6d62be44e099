/*!
# Wiesen DevKit - test support without a broker

Lets the client core be developed and tested without a running MQTT broker
or a writable filesystem:
- [`MockPublisher`] records every fan-out call the core makes
  (persisted values, alerts, status changes, live-surface refreshes)
  and exposes them for assertions.
*/

pub mod mock_publisher;

pub use mock_publisher::{MockPublisher, PersistedValue};
