//! Store capabilities the synchronization core depends on
//!
//! Both the socket client and the in-process [`crate::memory::MemoryStore`]
//! implement these traits, so the engine and command handler never know
//! which one they talk to.

use async_trait::async_trait;
use racetimer_core::models::{Roster, RosterEntry, TimerRecord, TimerWrite};
use tokio::sync::mpsc;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or the connection dropped
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with an error
    #[error("Store rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("Invalid data from store: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One delivery on a subscription: the full current value, or a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreUpdate<T> {
    Value(T),
    Error(StoreError),
}

/// Push subscription; each item is the whole value at that point.
pub type Subscription<T> = mpsc::UnboundedReceiver<StoreUpdate<T>>;

/// The shared stopwatch record. `None` means the record was never written.
#[async_trait]
pub trait TimerRecordStore: Send + Sync {
    /// Subscribe to the record. The current value is delivered first.
    async fn subscribe_timer(&self) -> Result<Subscription<Option<TimerRecord>>>;

    async fn read_timer(&self) -> Result<Option<TimerRecord>>;

    /// Overwrite the record, returning what the store saved.
    async fn write_timer(&self, value: TimerWrite) -> Result<TimerRecord>;

    /// Overwrite only if the stored record still equals `expected`.
    /// Returns `None` when another write got there first.
    async fn update_timer_if_unchanged(
        &self,
        expected: Option<TimerRecord>,
        value: TimerWrite,
    ) -> Result<Option<TimerRecord>>;

    /// Signed `store clock - local clock` in milliseconds.
    async fn server_offset(&self) -> Result<i64>;
}

/// Keyed roster collection
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn subscribe_roster(&self) -> Result<Subscription<Roster>>;

    async fn read_roster(&self) -> Result<Roster>;

    /// Add an entry, returning its key
    async fn push_entry(&self, entry: RosterEntry) -> Result<String>;

    /// Remove an entry; `false` if the key was not present
    async fn remove_entry(&self, key: &str) -> Result<bool>;

    /// Remove every entry, returning how many were removed
    async fn remove_all(&self) -> Result<usize>;
}
