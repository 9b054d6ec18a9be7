//! In-process store
//!
//! Implements both store traits without a daemon. The store clock runs
//! `skew` milliseconds ahead of the local clock it is given, and failures
//! can be switched on to exercise the error paths of the sync core.

use async_trait::async_trait;
use racetimer_core::clock::{store_time, Clock};
use racetimer_core::models::{new_roster_key, Roster, RosterEntry, TimerRecord, TimerWrite};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::fanout::Topic;
use crate::store::{Result, RosterStore, StoreError, Subscription, TimerRecordStore};

pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    skew_ms: AtomicI64,
    timer: Mutex<Option<TimerRecord>>,
    roster: Mutex<Roster>,
    timer_topic: Topic<Option<TimerRecord>>,
    roster_topic: Topic<Roster>,
    offline: AtomicBool,
    offset_unavailable: AtomicBool,
}

impl MemoryStore {
    /// Store whose clock reads `local clock + skew_ms`
    pub fn new(clock: Arc<dyn Clock>, skew_ms: i64) -> Self {
        let timer_topic = Topic::new();
        timer_topic.publish(None);
        let roster_topic = Topic::new();
        roster_topic.publish(Roster::new());

        Self {
            clock,
            skew_ms: AtomicI64::new(skew_ms),
            timer: Mutex::new(None),
            roster: Mutex::new(Roster::new()),
            timer_topic,
            roster_topic,
            offline: AtomicBool::new(false),
            offset_unavailable: AtomicBool::new(false),
        }
    }

    pub fn server_now(&self) -> i64 {
        store_time(self.clock.now_millis(), self.skew_ms.load(Ordering::SeqCst))
    }

    pub fn set_skew(&self, skew_ms: i64) {
        self.skew_ms.store(skew_ms, Ordering::SeqCst);
    }

    /// Make every read and write fail with `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make only the offset query fail
    pub fn set_offset_unavailable(&self, unavailable: bool) {
        self.offset_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Deliver a subscription error to every timer and roster subscriber
    pub fn emit_error(&self, error: StoreError) {
        self.timer_topic.publish_error(error.clone());
        self.roster_topic.publish_error(error);
    }

    /// Replace the record directly, as another client would
    pub async fn put_timer(&self, record: Option<TimerRecord>) {
        let mut timer = self.timer.lock().await;
        *timer = record;
        self.timer_topic.publish(record);
    }

    pub async fn current_timer(&self) -> Option<TimerRecord> {
        *self.timer.lock().await
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TimerRecordStore for MemoryStore {
    async fn subscribe_timer(&self) -> Result<Subscription<Option<TimerRecord>>> {
        self.ensure_online()?;
        // Hold the record lock so no write slips between snapshot and registration
        let _timer = self.timer.lock().await;
        Ok(self.timer_topic.subscribe())
    }

    async fn read_timer(&self) -> Result<Option<TimerRecord>> {
        self.ensure_online()?;
        Ok(*self.timer.lock().await)
    }

    async fn write_timer(&self, value: TimerWrite) -> Result<TimerRecord> {
        self.ensure_online()?;
        let mut timer = self.timer.lock().await;
        let record = value.resolve(self.server_now());
        *timer = Some(record);
        self.timer_topic.publish(Some(record));
        Ok(record)
    }

    async fn update_timer_if_unchanged(
        &self,
        expected: Option<TimerRecord>,
        value: TimerWrite,
    ) -> Result<Option<TimerRecord>> {
        self.ensure_online()?;
        let mut timer = self.timer.lock().await;
        if *timer != expected {
            return Ok(None);
        }
        let record = value.resolve(self.server_now());
        *timer = Some(record);
        self.timer_topic.publish(Some(record));
        Ok(Some(record))
    }

    async fn server_offset(&self) -> Result<i64> {
        self.ensure_online()?;
        if self.offset_unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("offset unavailable".to_string()));
        }
        Ok(self.skew_ms.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl RosterStore for MemoryStore {
    async fn subscribe_roster(&self) -> Result<Subscription<Roster>> {
        self.ensure_online()?;
        let _roster = self.roster.lock().await;
        Ok(self.roster_topic.subscribe())
    }

    async fn read_roster(&self) -> Result<Roster> {
        self.ensure_online()?;
        Ok(self.roster.lock().await.clone())
    }

    async fn push_entry(&self, entry: RosterEntry) -> Result<String> {
        self.ensure_online()?;
        entry.validate().map_err(|e| StoreError::Rejected {
            code: -32602,
            message: e.to_string(),
        })?;

        let mut roster = self.roster.lock().await;
        let key = new_roster_key();
        roster.insert(key.clone(), entry);
        self.roster_topic.publish(roster.clone());
        Ok(key)
    }

    async fn remove_entry(&self, key: &str) -> Result<bool> {
        self.ensure_online()?;
        let mut roster = self.roster.lock().await;
        let removed = roster.remove(key).is_some();
        if removed {
            self.roster_topic.publish(roster.clone());
        }
        Ok(removed)
    }

    async fn remove_all(&self) -> Result<usize> {
        self.ensure_online()?;
        let mut roster = self.roster.lock().await;
        let removed = roster.len();
        roster.clear();
        self.roster_topic.publish(Roster::new());
        Ok(removed)
    }
}
