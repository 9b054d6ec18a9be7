//! Clock sources and the stopwatch time arithmetic
//!
//! All timestamps are epoch milliseconds. Durations are non-negative
//! milliseconds. Every place that turns a record into a displayed duration
//! goes through [`displayed_elapsed`].

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" in epoch milliseconds.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock of the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Project a local instant into store time.
pub fn store_time(local_millis: i64, offset_millis: i64) -> i64 {
    local_millis.saturating_add(offset_millis)
}

/// Elapsed duration represented by a timer record at `store_now`.
///
/// A running interval whose start lies in the future (store clock read
/// behind the recorded start) contributes nothing rather than a negative
/// amount.
pub fn displayed_elapsed(elapsed: u64, running: bool, start_time: i64, store_now: i64) -> u64 {
    if !running {
        return elapsed;
    }

    let current = store_now.saturating_sub(start_time).max(0) as u64;
    elapsed.saturating_add(current)
}

/// Format a duration as `MM:SS:hh` (minutes, seconds, hundredths).
pub fn format_elapsed(millis: u64) -> String {
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1000;
    let hundredths = (millis % 1000) / 10;
    format!("{:02}:{:02}:{:02}", minutes, seconds, hundredths)
}

/// Text shown while a start is gated by the countdown.
pub fn format_countdown(remaining_seconds: u32) -> String {
    format!("Starting in {}...", remaining_seconds)
}
