use parking_lot::Mutex;
use std::sync::Arc;

use crate::alarm::AlarmState;
use crate::models::ValueCache;

pub type Shared<T> = Arc<Mutex<T>>;

/// Single writer (the message router), snapshot reads for everyone else.
pub type SharedCache = Shared<ValueCache>;
pub type SharedAlarm = Shared<AlarmState>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
