//! Low-battery alarm with hysteresis.
//!
//! The latch fires exactly once when the state of charge first drops below
//! the threshold while armed, then stays silent until the value climbs back
//! above threshold + margin. Prevents alert storms while the reading
//! oscillates around the threshold.

use serde::{Deserialize, Serialize};

/// Gap above the threshold required before the latch re-arms.
pub const HYSTERESIS_MARGIN: f64 = 5.0;

/// Explicit latch states instead of independent booleans, so the hysteresis
/// invariant is visible in the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmLatch {
    Disarmed,
    ArmedClear,
    ArmedTriggered,
}

/// Emitted when the state of charge first crosses below the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmEvent {
    pub soc: f64,
    pub threshold_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlarmState {
    latch: AlarmLatch,
    threshold_percent: f64,
}

impl AlarmState {
    pub fn new(armed: bool, threshold_percent: f64) -> Self {
        Self {
            latch: if armed { AlarmLatch::ArmedClear } else { AlarmLatch::Disarmed },
            threshold_percent,
        }
    }

    pub fn latch(&self) -> AlarmLatch {
        self.latch
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn is_triggered(&self) -> bool {
        self.latch == AlarmLatch::ArmedTriggered
    }

    /// Explicit user reconfiguration. Resets the latch so a re-armed alarm
    /// starts clean.
    pub fn configure(&mut self, armed: bool, threshold_percent: f64) {
        self.threshold_percent = threshold_percent;
        self.latch = if armed { AlarmLatch::ArmedClear } else { AlarmLatch::Disarmed };
    }

    /// Feed a new state-of-charge reading.
    ///
    /// Transition table:
    /// - ArmedClear, `soc < threshold` => ArmedTriggered, event
    /// - any state, `soc > threshold + margin` => latch cleared
    /// - otherwise no change, no event
    pub fn observe(&mut self, soc: f64) -> Option<AlarmEvent> {
        if soc > self.threshold_percent + HYSTERESIS_MARGIN {
            if self.latch == AlarmLatch::ArmedTriggered {
                self.latch = AlarmLatch::ArmedClear;
            }
            return None;
        }
        if self.latch == AlarmLatch::ArmedClear && soc < self.threshold_percent {
            self.latch = AlarmLatch::ArmedTriggered;
            return Some(AlarmEvent { soc, threshold_percent: self.threshold_percent });
        }
        None
    }
}
