//! Client configuration, loaded once at startup from a TOML file.
//!
//! Path comes from `WIESEN_CONFIG` (default `wiesen.toml`); a missing or
//! invalid file falls back to defaults so the client always starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::models::MonitoredField;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub mqtt: MqttConf,
    pub topics: TopicsConf,
    pub alarm: AlarmConf,
    pub watchdog: WatchdogConf,
    pub snapshot: SnapshotConf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub clean_session: bool,
    /// Transport-level retry loop. The watchdog supersedes it but both may
    /// coexist; off by default.
    pub auto_reconnect: bool,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 15,
            clean_session: true,
            auto_reconnect: false,
        }
    }
}

impl MqttConf {
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("wiesen-client-{}", std::process::id()))
    }
}

/// Fixed topic names for the three monitored fields. Process-wide
/// configuration, never re-derived at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConf {
    pub soc: String,
    pub solar: String,
    pub battery: String,
}

impl Default for TopicsConf {
    fn default() -> Self {
        Self {
            soc: "wiesenbatterie/soc".into(),
            solar: "wiesenbatterie/solar".into(),
            battery: "wiesenbatterie/battery".into(),
        }
    }
}

impl TopicsConf {
    pub fn resolve(&self, topic: &str) -> Option<MonitoredField> {
        if topic == self.soc {
            Some(MonitoredField::StateOfCharge)
        } else if topic == self.solar {
            Some(MonitoredField::SolarPower)
        } else if topic == self.battery {
            Some(MonitoredField::BatteryPower)
        } else {
            None
        }
    }

    pub fn for_field(&self, field: MonitoredField) -> &str {
        match field {
            MonitoredField::StateOfCharge => &self.soc,
            MonitoredField::SolarPower => &self.solar,
            MonitoredField::BatteryPower => &self.battery,
        }
    }

    /// (topic, field) pairs in subscription order.
    pub fn all(&self) -> [(&str, MonitoredField); 3] {
        [
            (self.soc.as_str(), MonitoredField::StateOfCharge),
            (self.solar.as_str(), MonitoredField::SolarPower),
            (self.battery.as_str(), MonitoredField::BatteryPower),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConf {
    pub enabled: bool,
    pub threshold_percent: f64,
}

impl Default for AlarmConf {
    fn default() -> Self {
        Self { enabled: false, threshold_percent: 20.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConf {
    pub interval_secs: u64,
    pub settle_delay_ms: u64,
}

impl Default for WatchdogConf {
    fn default() -> Self {
        Self { interval_secs: 8, settle_delay_ms: 500 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConf {
    pub path: Option<PathBuf>,
}

impl SnapshotConf {
    /// Snapshot lives in the OS data dir unless configured, so widget-style
    /// readers in other processes find it at a predictable place.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wiesen-client")
                .join("snapshot.json")
        })
    }
}

pub async fn load_config() -> ClientConfig {
    let path = std::env::var("WIESEN_CONFIG").unwrap_or_else(|_| "wiesen.toml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return ClientConfig::default();
        }
        toml::from_str(&txt).unwrap_or_else(|e| {
            warn!(path = %path, error = %e, "invalid config, using defaults");
            ClientConfig::default()
        })
    } else {
        info!(path = %path, "no config file, using defaults");
        ClientConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.mqtt.keep_alive_secs, 15);
        assert!(cfg.mqtt.clean_session);
        assert!(!cfg.mqtt.auto_reconnect);
        assert_eq!(cfg.alarm.threshold_percent, 20.0);
        assert!(!cfg.alarm.enabled);
        assert_eq!(cfg.watchdog.interval_secs, 8);
        assert_eq!(cfg.watchdog.settle_delay_ms, 500);
    }

    #[test]
    fn default_client_id_includes_the_pid() {
        let cfg = MqttConf::default();
        assert!(cfg.client_id().starts_with("wiesen-client-"));
    }

    #[test]
    fn topics_resolve_to_their_fields() {
        let topics = TopicsConf::default();
        assert_eq!(topics.resolve("wiesenbatterie/soc"), Some(MonitoredField::StateOfCharge));
        assert_eq!(topics.resolve("wiesenbatterie/solar"), Some(MonitoredField::SolarPower));
        assert_eq!(topics.resolve("wiesenbatterie/battery"), Some(MonitoredField::BatteryPower));
        assert_eq!(topics.resolve("wiesenbatterie/voltage"), None);
        assert_eq!(topics.for_field(MonitoredField::StateOfCharge), "wiesenbatterie/soc");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: ClientConfig = toml::from_str(
            r#"
            [mqtt]
            host = "10.0.0.5"
            username = "pi"
            password = "geheim"

            [alarm]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.mqtt.host, "10.0.0.5");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.mqtt.username.as_deref(), Some("pi"));
        assert!(cfg.alarm.enabled);
        assert_eq!(cfg.alarm.threshold_percent, 20.0);
        assert_eq!(cfg.topics.soc, "wiesenbatterie/soc");
    }
}
