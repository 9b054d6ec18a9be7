//! Persisted state of the realtime store

use serde::{Deserialize, Serialize};

use super::{Roster, TimerRecord};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreSnapshot {
    /// `None` until the first timer write
    #[serde(default)]
    pub timer: Option<TimerRecord>,
    #[serde(default)]
    pub roster: Roster,
}

impl StoreSnapshot {
    /// Timer record as readers see it: absent means the default record.
    pub fn timer_or_default(&self) -> TimerRecord {
        self.timer.unwrap_or_default()
    }
}
