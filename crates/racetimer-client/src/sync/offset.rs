//! Store clock offset estimation

use racetimer_core::clock::{store_time, Clock};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::store::TimerRecordStore;

/// Caches `store clock - local clock` for a refresh period.
///
/// A failed fetch yields 0 and is retried on the next call.
pub struct ClockOffsetService {
    store: Arc<dyn TimerRecordStore>,
    clock: Arc<dyn Clock>,
    refresh: Duration,
    cached: Mutex<Option<(i64, Instant)>>,
}

impl ClockOffsetService {
    pub fn new(store: Arc<dyn TimerRecordStore>, clock: Arc<dyn Clock>, refresh: Duration) -> Self {
        Self {
            store,
            clock,
            refresh,
            cached: Mutex::new(None),
        }
    }

    /// Signed offset in milliseconds
    pub async fn current_offset(&self) -> i64 {
        if let Some(offset) = self.fresh_offset() {
            return offset;
        }

        match self.store.server_offset().await {
            Ok(offset) => {
                tracing::trace!("Store clock offset: {} ms", offset);
                *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some((offset, Instant::now()));
                offset
            }
            Err(e) => {
                tracing::warn!("Could not fetch store clock offset, assuming 0: {}", e);
                0
            }
        }
    }

    /// Last fetched offset, if still within the refresh period
    pub fn fresh_offset(&self) -> Option<i64> {
        let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        cached.and_then(|(offset, fetched_at)| {
            (fetched_at.elapsed() < self.refresh).then_some(offset)
        })
    }

    pub fn local_now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub async fn store_time(&self, local_millis: i64) -> i64 {
        store_time(local_millis, self.current_offset().await)
    }

    /// Estimated store clock reading right now
    pub async fn store_now(&self) -> i64 {
        let offset = self.current_offset().await;
        store_time(self.local_now(), offset)
    }

    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
