//! Core data model: monitored fields, value samples, the last-known-value
//! cache and the connection status owned by the supervisor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The three sensor channels the client monitors. Each maps to exactly one
/// broker topic (see `TopicsConf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoredField {
    StateOfCharge,
    SolarPower,
    BatteryPower,
}

impl MonitoredField {
    pub const ALL: [MonitoredField; 3] = [
        MonitoredField::StateOfCharge,
        MonitoredField::SolarPower,
        MonitoredField::BatteryPower,
    ];

    /// Stable key used in the snapshot file and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoredField::StateOfCharge => "soc",
            MonitoredField::SolarPower => "solar_power",
            MonitoredField::BatteryPower => "battery_power",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "soc" => Some(MonitoredField::StateOfCharge),
            "solar_power" => Some(MonitoredField::SolarPower),
            "battery_power" => Some(MonitoredField::BatteryPower),
            _ => None,
        }
    }
}

impl fmt::Display for MonitoredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reading from the broker. Immutable once created; a newer sample for
/// the same field replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSample {
    pub field: MonitoredField,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl ValueSample {
    /// Sample stamped with the current arrival time.
    pub fn new(field: MonitoredField, value: f64) -> Self {
        Self::at(field, value, Utc::now())
    }

    pub fn at(field: MonitoredField, value: f64, observed_at: DateTime<Utc>) -> Self {
        Self { field, value, observed_at }
    }

    /// Display form consumed by presentation surfaces: whole numbers render
    /// without decimals ("342"), everything else verbatim ("17.5").
    pub fn display_value(&self) -> String {
        if self.value.fract() == 0.0 {
            format!("{:.0}", self.value)
        } else {
            self.value.to_string()
        }
    }
}

/// Latest sample per field, with per-field freshness timestamps.
///
/// At most one sample per field. Out-of-order network delivery is resolved
/// last-write-wins: whatever arrives last is the value everyone sees.
#[derive(Debug, Default)]
pub struct ValueCache {
    samples: HashMap<MonitoredField, ValueSample>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sample: ValueSample) {
        self.samples.insert(sample.field, sample);
    }

    pub fn get(&self, field: MonitoredField) -> Option<&ValueSample> {
        self.samples.get(&field)
    }

    pub fn value(&self, field: MonitoredField) -> Option<f64> {
        self.samples.get(&field).map(|s| s.value)
    }

    /// When the field was last updated, for staleness display.
    pub fn last_updated(&self, field: MonitoredField) -> Option<DateTime<Utc>> {
        self.samples.get(&field).map(|s| s.observed_at)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Latest (soc, solar, battery) triple for live surfaces.
    pub fn triple(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        (
            self.value(MonitoredField::StateOfCharge),
            self.value(MonitoredField::SolarPower),
            self.value(MonitoredField::BatteryPower),
        )
    }
}

/// Connection status, exactly one per process, owned by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Failed(String),
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Idle => write!(f, "idle"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn display_value_drops_trailing_zero_decimals() {
        let sample = ValueSample::new(MonitoredField::SolarPower, 342.0);
        assert_eq!(sample.display_value(), "342");

        let sample = ValueSample::new(MonitoredField::StateOfCharge, 17.5);
        assert_eq!(sample.display_value(), "17.5");

        let sample = ValueSample::new(MonitoredField::BatteryPower, 0.0);
        assert_eq!(sample.display_value(), "0");
    }

    #[test]
    fn cache_round_trip_keeps_value_and_timestamp() {
        let t = Utc.with_ymd_and_hms(2025, 12, 27, 12, 0, 0).unwrap();
        let mut cache = ValueCache::new();
        cache.insert(ValueSample::at(MonitoredField::SolarPower, 342.0, t));

        let sample = cache.get(MonitoredField::SolarPower).unwrap();
        assert_eq!(sample.display_value(), "342");
        assert_eq!(sample.observed_at, t);
        assert_eq!(cache.last_updated(MonitoredField::SolarPower), Some(t));
    }

    #[test]
    fn cache_is_last_write_wins() {
        let mut cache = ValueCache::new();
        cache.insert(ValueSample::new(MonitoredField::StateOfCharge, 80.0));
        cache.insert(ValueSample::new(MonitoredField::StateOfCharge, 79.0));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.value(MonitoredField::StateOfCharge), Some(79.0));
    }

    #[test]
    fn triple_reports_missing_fields_as_none() {
        let mut cache = ValueCache::new();
        assert_eq!(cache.triple(), (None, None, None));

        cache.insert(ValueSample::new(MonitoredField::SolarPower, 120.0));
        assert_eq!(cache.triple(), (None, Some(120.0), None));
    }

    #[test]
    fn field_keys_round_trip() {
        for field in MonitoredField::ALL {
            assert_eq!(MonitoredField::from_key(field.as_str()), Some(field));
        }
        assert_eq!(MonitoredField::from_key("voltage"), None);
    }
}
