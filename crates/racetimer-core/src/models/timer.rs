//! Shared stopwatch record

use crate::clock::displayed_elapsed;
use serde::{Deserialize, Serialize};

/// The single shared stopwatch record.
///
/// `elapsed` holds the total of all completed running intervals and never
/// includes the interval in progress. `start_time` is the store-clock
/// instant the current interval began, `0` while stopped.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub running: bool,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub elapsed: u64,
}

/// Start time carried by a write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StartTime {
    /// A concrete store-clock instant.
    At(i64),
    /// Placeholder the store replaces with its own clock when applying the write.
    Server(ServerValue),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerValue {
    #[serde(rename = ".sv")]
    pub kind: ServerValueKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerValueKind {
    Timestamp,
}

/// Whole-record write to the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerWrite {
    pub running: bool,
    pub start_time: StartTime,
    pub elapsed: u64,
}

impl TimerRecord {
    /// Record written by a reset.
    pub fn zero() -> Self {
        Self::default()
    }

    /// True elapsed duration at `store_now`.
    pub fn elapsed_at(&self, store_now: i64) -> u64 {
        displayed_elapsed(self.elapsed, self.running, self.start_time, store_now)
    }

    /// The record a stop at `store_now` produces: the running interval is
    /// folded into `elapsed`. A stopped record is returned unchanged.
    pub fn stopped_at(&self, store_now: i64) -> Self {
        if !self.running {
            return *self;
        }

        Self {
            running: false,
            start_time: 0,
            elapsed: self.elapsed_at(store_now),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_stopped(&self) -> bool {
        !self.running
    }
}

impl StartTime {
    pub fn server_timestamp() -> Self {
        StartTime::Server(ServerValue {
            kind: ServerValueKind::Timestamp,
        })
    }

    pub fn resolve(self, server_now: i64) -> i64 {
        match self {
            StartTime::At(millis) => millis,
            StartTime::Server(_) => server_now,
        }
    }
}

impl TimerWrite {
    /// Begin a running interval stamped by the store's clock, keeping the
    /// previously accumulated duration.
    pub fn start(previous_elapsed: u64) -> Self {
        Self {
            running: true,
            start_time: StartTime::server_timestamp(),
            elapsed: previous_elapsed,
        }
    }

    pub fn reset() -> Self {
        TimerRecord::zero().into()
    }

    /// The record stored when this write is applied at `server_now`.
    pub fn resolve(self, server_now: i64) -> TimerRecord {
        TimerRecord {
            running: self.running,
            start_time: self.start_time.resolve(server_now),
            elapsed: self.elapsed,
        }
    }
}

impl From<TimerRecord> for TimerWrite {
    fn from(record: TimerRecord) -> Self {
        Self {
            running: record.running,
            start_time: StartTime::At(record.start_time),
            elapsed: record.elapsed,
        }
    }
}
