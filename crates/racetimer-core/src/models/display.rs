//! Per-client derived display state

use crate::clock::format_elapsed;
use serde::{Deserialize, Serialize};

use super::TimerRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Stopped,
    Running,
    /// The store could not be reached; the displayed value is the last good one.
    Unknown,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Stopped => "Stopped",
            TimerStatus::Running => "Running",
            TimerStatus::Unknown => "Unknown",
        }
    }
}

/// What a client shows for the shared stopwatch. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    pub status: TimerStatus,
    pub displayed_ms: u64,
}

/// Payload handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub status: TimerStatus,
    pub formatted_time: String,
}

impl DisplayState {
    pub fn stopped(displayed_ms: u64) -> Self {
        Self {
            status: TimerStatus::Stopped,
            displayed_ms,
        }
    }

    pub fn running(displayed_ms: u64) -> Self {
        Self {
            status: TimerStatus::Running,
            displayed_ms,
        }
    }

    /// Project a record at `store_now`. An absent record is the default one.
    pub fn project(record: Option<&TimerRecord>, store_now: i64) -> Self {
        let record = record.copied().unwrap_or_default();
        let displayed_ms = record.elapsed_at(store_now);

        if record.running {
            Self::running(displayed_ms)
        } else {
            Self::stopped(displayed_ms)
        }
    }

    /// Same value, status marked unknown.
    pub fn unknown(self) -> Self {
        Self {
            status: TimerStatus::Unknown,
            ..self
        }
    }

    pub fn formatted_time(&self) -> String {
        format_elapsed(self.displayed_ms)
    }

    pub fn presentation(&self) -> Presentation {
        Presentation {
            status: self.status,
            formatted_time: self.formatted_time(),
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::stopped(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_record_projects_to_zero() {
        let state = DisplayState::project(None, 1_700_000_000_000);
        assert_eq!(state, DisplayState::stopped(0));
        assert_eq!(state.formatted_time(), "00:00:00");
    }

    #[test]
    fn test_stopped_record_formats_zero() {
        let record = TimerRecord::zero();
        let presentation = DisplayState::project(Some(&record), 5).presentation();
        assert_eq!(presentation.status, TimerStatus::Stopped);
        assert_eq!(presentation.formatted_time, "00:00:00");
    }

    #[test]
    fn test_running_record_two_seconds_later() {
        let start = 1_700_000_000_000;
        let record = TimerRecord {
            running: true,
            start_time: start,
            elapsed: 5000,
        };
        let state = DisplayState::project(Some(&record), start + 2000);
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.formatted_time(), "00:07:00");
    }

    #[test]
    fn test_unknown_keeps_value() {
        let state = DisplayState::running(1234).unknown();
        assert_eq!(state.status, TimerStatus::Unknown);
        assert_eq!(state.displayed_ms, 1234);
        assert_eq!(state.status.as_str(), "Unknown");
    }
}
