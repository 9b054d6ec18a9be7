//! Realtime store - the authoritative timer record, roster and clock

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::event_manager::EventManager;
use crate::events::{RosterValueEvent, TimerValueEvent};
use racetimer_core::{
    clock::Clock,
    models::{new_roster_key, Roster, RosterEntry, StoreSnapshot, TimerRecord, TimerWrite},
    storage::SnapshotStorage,
    Result as CoreResult,
};

#[derive(Debug, thiserror::Error)]
pub enum RealtimeStoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] racetimer_core::Error),

    #[error("Invalid entry: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, RealtimeStoreError>;

/// Shared state every client subscribes to.
///
/// All mutations go through one write lock, and the change event is emitted
/// before the lock is released, so subscribers see values in write order.
pub struct RealtimeStore {
    state: RwLock<StoreSnapshot>,
    storage: Option<SnapshotStorage>,
    event_manager: Arc<EventManager>,
    clock: Arc<dyn Clock>,
}

impl RealtimeStore {
    /// Create a store backed by a snapshot file, loading its last state.
    pub fn new(
        event_manager: Arc<EventManager>,
        storage: SnapshotStorage,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let snapshot = storage.load()?;
        tracing::info!(
            "Loaded store snapshot: timer={:?}, roster entries={}",
            snapshot.timer,
            snapshot.roster.len()
        );

        Ok(Self {
            state: RwLock::new(snapshot),
            storage: Some(storage),
            event_manager,
            clock,
        })
    }

    /// Create a store that keeps everything in memory.
    pub fn in_memory(event_manager: Arc<EventManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreSnapshot::default()),
            storage: None,
            event_manager,
            clock,
        }
    }

    /// Current reading of the store clock
    pub fn server_time(&self) -> i64 {
        self.clock.now_millis()
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    pub async fn get_timer(&self) -> Option<TimerRecord> {
        self.state.read().await.timer
    }

    /// Overwrite the timer record. Server timestamps resolve against the store clock.
    pub async fn set_timer(&self, write: TimerWrite) -> Result<TimerRecord> {
        let mut state = self.state.write().await;
        let record = write.resolve(self.server_time());

        self.commit(&mut state, |next| next.timer = Some(record))?;
        self.event_manager
            .emit_timer(TimerValueEvent::new(state.timer));

        tracing::info!("Timer record set: {:?}", record);
        Ok(record)
    }

    /// Overwrite the timer record only if it still equals `expected`.
    ///
    /// Returns whether the write was applied and the record now stored.
    pub async fn update_timer_if_unchanged(
        &self,
        expected: Option<TimerRecord>,
        write: TimerWrite,
    ) -> Result<(bool, Option<TimerRecord>)> {
        let mut state = self.state.write().await;

        if state.timer != expected {
            tracing::info!(
                "Timer compare-and-set rejected: expected {:?}, found {:?}",
                expected,
                state.timer
            );
            return Ok((false, state.timer));
        }

        let record = write.resolve(self.server_time());
        self.commit(&mut state, |next| next.timer = Some(record))?;
        self.event_manager
            .emit_timer(TimerValueEvent::new(state.timer));

        tracing::info!("Timer record swapped: {:?}", record);
        Ok((true, state.timer))
    }

    pub async fn list_roster(&self) -> Roster {
        self.state.read().await.roster.clone()
    }

    /// Add an entry under a new time-ordered key
    pub async fn push_roster(&self, entry: RosterEntry) -> Result<String> {
        entry
            .validate()
            .map_err(|e| RealtimeStoreError::Invalid(e.to_string()))?;

        let key = new_roster_key();
        let mut state = self.state.write().await;

        self.commit(&mut state, |next| {
            next.roster.insert(key.clone(), entry);
        })?;
        self.event_manager
            .emit_roster(RosterValueEvent::new(state.roster.clone()));

        tracing::info!("Roster entry added: {}", key);
        Ok(key)
    }

    /// Remove one entry. Unknown keys are not an error.
    pub async fn remove_roster(&self, key: &str) -> Result<bool> {
        let mut state = self.state.write().await;

        if !state.roster.contains_key(key) {
            tracing::debug!("Roster entry {} not present", key);
            return Ok(false);
        }

        self.commit(&mut state, |next| {
            next.roster.remove(key);
        })?;
        self.event_manager
            .emit_roster(RosterValueEvent::new(state.roster.clone()));

        tracing::info!("Roster entry removed: {}", key);
        Ok(true)
    }

    /// Remove every entry, returning how many were removed
    pub async fn clear_roster(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        let removed = state.roster.len();

        self.commit(&mut state, |next| next.roster.clear())?;
        self.event_manager
            .emit_roster(RosterValueEvent::new(Roster::new()));

        tracing::info!("Roster cleared ({} entries)", removed);
        Ok(removed)
    }

    /// Apply `change` to a copy, persist it, then make it current.
    fn commit(
        &self,
        state: &mut StoreSnapshot,
        change: impl FnOnce(&mut StoreSnapshot),
    ) -> Result<()> {
        let mut next = state.clone();
        change(&mut next);

        if let Some(storage) = &self.storage {
            storage.save(&next)?;
        }

        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StoreEvent;
    use racetimer_core::clock::ManualClock;
    use racetimer_core::models::StartTime;
    use tempfile::TempDir;

    fn create_store() -> (RealtimeStore, Arc<ManualClock>, Arc<EventManager>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let event_manager = Arc::new(EventManager::new());
        let store = RealtimeStore::in_memory(event_manager.clone(), clock.clone());
        (store, clock, event_manager)
    }

    #[tokio::test]
    async fn test_absent_timer() {
        let (store, _, _) = create_store();
        assert!(store.get_timer().await.is_none());
        assert_eq!(store.snapshot().await.timer_or_default(), TimerRecord::zero());
    }

    #[tokio::test]
    async fn test_server_timestamp_uses_store_clock() {
        let (store, clock, _) = create_store();
        clock.set(42_000);

        let record = store.set_timer(TimerWrite::start(1500)).await.unwrap();
        assert!(record.running);
        assert_eq!(record.start_time, 42_000);
        assert_eq!(record.elapsed, 1500);
        assert_eq!(store.get_timer().await, Some(record));
    }

    #[tokio::test]
    async fn test_set_timer_emits_value() {
        let (store, _, event_manager) = create_store();
        let mut rx = event_manager.subscribe();

        store.set_timer(TimerWrite::reset()).await.unwrap();

        match rx.recv().await.unwrap() {
            StoreEvent::Timer(e) => assert_eq!(e.value, Some(TimerRecord::zero())),
            _ => panic!("Expected timer event"),
        }
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let (store, _, _) = create_store();

        let (committed, current) = store
            .update_timer_if_unchanged(None, TimerWrite::start(0))
            .await
            .unwrap();
        assert!(committed);
        let running = current.unwrap();

        // A second writer still holding the absent value loses
        let (committed, current) = store
            .update_timer_if_unchanged(None, TimerWrite::reset())
            .await
            .unwrap();
        assert!(!committed);
        assert_eq!(current, Some(running));

        let stop = TimerWrite {
            running: false,
            start_time: StartTime::At(0),
            elapsed: 900,
        };
        let (committed, current) = store
            .update_timer_if_unchanged(Some(running), stop)
            .await
            .unwrap();
        assert!(committed);
        assert_eq!(current.unwrap().elapsed, 900);
    }

    #[tokio::test]
    async fn test_roster_operations() {
        let (store, _, event_manager) = create_store();
        let mut rx = event_manager.subscribe();

        let first = store
            .push_roster(RosterEntry::new("Charles", "16", "Ferrari").unwrap())
            .await
            .unwrap();
        let second = store
            .push_roster(RosterEntry::new("Carlos", "55", "Williams").unwrap())
            .await
            .unwrap();
        assert_eq!(store.list_roster().await.len(), 2);

        assert!(store.remove_roster(&first).await.unwrap());
        assert!(!store.remove_roster(&first).await.unwrap());
        let roster = store.list_roster().await;
        assert_eq!(roster.len(), 1);
        assert!(roster.contains_key(&second));

        assert_eq!(store.clear_roster().await.unwrap(), 1);
        assert!(store.list_roster().await.is_empty());

        // push, push, remove, clear
        let mut sizes = Vec::new();
        for _ in 0..4 {
            match rx.recv().await.unwrap() {
                StoreEvent::Roster(e) => sizes.push(e.value.len()),
                _ => panic!("Expected roster event"),
            }
        }
        assert_eq!(sizes, vec![1, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_invalid_entry_rejected() {
        let (store, _, _) = create_store();
        let mut entry = RosterEntry::new("Yuki", "22", "RB").unwrap();
        entry.team = " ".to_string();

        assert!(matches!(
            store.push_roster(entry).await,
            Err(RealtimeStoreError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(5_000));

        {
            let store = RealtimeStore::new(
                Arc::new(EventManager::new()),
                SnapshotStorage::new(temp_dir.path().to_path_buf()),
                clock.clone(),
            )
            .unwrap();
            store.set_timer(TimerWrite::start(700)).await.unwrap();
            store
                .push_roster(RosterEntry::new("George", "63", "Mercedes").unwrap())
                .await
                .unwrap();
        }

        let store = RealtimeStore::new(
            Arc::new(EventManager::new()),
            SnapshotStorage::new(temp_dir.path().to_path_buf()),
            clock,
        )
        .unwrap();
        let timer = store.get_timer().await.unwrap();
        assert!(timer.running);
        assert_eq!(timer.start_time, 5_000);
        assert_eq!(timer.elapsed, 700);
        assert_eq!(store.list_roster().await.len(), 1);
    }
}
