//! Timer sync engine - turns record updates into a ticking display

use racetimer_core::models::{DisplayState, TimerRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::offset::ClockOffsetService;
use crate::store::{StoreError, StoreUpdate, Subscription, TimerRecordStore};

struct EngineState {
    /// Last record received from the store
    record: Option<TimerRecord>,
    ticker: Option<JoinHandle<()>>,
}

/// Projects the shared record onto this client's display.
///
/// Owns at most one tick task. Every record update or subscription error
/// bumps the generation; a tick task only publishes while its generation is
/// current, so a cancelled task can never overwrite a newer state.
pub struct TimerSyncEngine {
    offsets: Arc<ClockOffsetService>,
    display_tx: Arc<watch::Sender<DisplayState>>,
    state: Mutex<EngineState>,
    generation: Arc<AtomicU64>,
    tick_interval: Duration,
}

impl TimerSyncEngine {
    pub fn new(offsets: Arc<ClockOffsetService>, tick_interval: Duration) -> Self {
        let (display_tx, _) = watch::channel(DisplayState::default());

        Self {
            offsets,
            display_tx: Arc::new(display_tx),
            state: Mutex::new(EngineState {
                record: None,
                ticker: None,
            }),
            generation: Arc::new(AtomicU64::new(0)),
            tick_interval,
        }
    }

    /// Receiver for display changes
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display_tx.subscribe()
    }

    pub fn display(&self) -> DisplayState {
        *self.display_tx.borrow()
    }

    pub async fn is_ticking(&self) -> bool {
        let state = self.state.lock().await;
        state
            .ticker
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Apply a new value of the shared record. `None` is the default record.
    pub async fn on_record_update(&self, record: Option<TimerRecord>) {
        let mut state = self.state.lock().await;
        let effective = record.unwrap_or_default();

        if !effective.running {
            self.cancel_ticker(&mut state);
            state.record = record;
            self.display_tx
                .send_replace(DisplayState::stopped(effective.elapsed));
            tracing::debug!("Timer stopped at {} ms", effective.elapsed);
            return;
        }

        let already_projecting = state.record == record
            && state
                .ticker
                .as_ref()
                .is_some_and(|ticker| !ticker.is_finished());
        if already_projecting {
            tracing::trace!("Duplicate running update, keeping tick task");
            return;
        }

        let generation = self.cancel_ticker(&mut state);
        state.record = record;

        let store_now = self.offsets.store_now().await;
        let initial = effective.elapsed_at(store_now);
        self.display_tx.send_replace(DisplayState::running(initial));
        tracing::debug!(
            "Timer running from {} (elapsed {} ms)",
            effective.start_time,
            effective.elapsed
        );

        state.ticker = Some(tokio::spawn(tick_loop(
            TickContext {
                offsets: self.offsets.clone(),
                display_tx: self.display_tx.clone(),
                generation: self.generation.clone(),
                owner: generation,
            },
            effective,
            self.tick_interval,
            initial,
        )));
    }

    /// The feed failed: stop ticking and keep the last value as Unknown.
    pub async fn on_subscription_error(&self, error: &StoreError) {
        let mut state = self.state.lock().await;
        self.cancel_ticker(&mut state);
        self.display_tx.send_modify(|display| *display = display.unknown());
        tracing::warn!("Timer subscription error: {}", error);
    }

    /// Drive the engine from a subscription until it ends.
    pub async fn run(&self, mut subscription: Subscription<Option<TimerRecord>>) {
        while let Some(update) = subscription.recv().await {
            match update {
                StoreUpdate::Value(record) => self.on_record_update(record).await,
                StoreUpdate::Error(error) => self.on_subscription_error(&error).await,
            }
        }

        self.on_subscription_error(&StoreError::Unavailable(
            "subscription ended".to_string(),
        ))
        .await;
    }

    /// Subscribe to `store` and run the engine on a background task
    pub async fn attach(
        self: &Arc<Self>,
        store: &dyn TimerRecordStore,
    ) -> crate::store::Result<JoinHandle<()>> {
        let subscription = store.subscribe_timer().await?;
        let engine = self.clone();
        Ok(tokio::spawn(async move {
            engine.run(subscription).await;
        }))
    }

    pub async fn stop_ticking(&self) {
        let mut state = self.state.lock().await;
        self.cancel_ticker(&mut state);
    }

    /// Abort the current tick task and return the new generation
    fn cancel_ticker(&self, state: &mut EngineState) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        generation
    }
}

impl Drop for TimerSyncEngine {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(ticker) = self.state.get_mut().ticker.take() {
            ticker.abort();
        }
    }
}

struct TickContext {
    offsets: Arc<ClockOffsetService>,
    display_tx: Arc<watch::Sender<DisplayState>>,
    generation: Arc<AtomicU64>,
    /// Generation this task belongs to
    owner: u64,
}

impl TickContext {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.owner
    }
}

async fn tick_loop(
    ctx: TickContext,
    record: TimerRecord,
    tick_interval: Duration,
    mut floor: u64,
) {
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the initial value is already shown
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let store_now = ctx.offsets.store_now().await;
        if !ctx.is_current() {
            break;
        }

        // Offset refreshes may move the store clock backwards
        let displayed = record.elapsed_at(store_now).max(floor);
        floor = displayed;

        ctx.display_tx.send_if_modified(|display| {
            if !ctx.is_current() {
                return false;
            }
            let next = DisplayState::running(displayed);
            if *display == next {
                return false;
            }
            *display = next;
            true
        });
    }

    tracing::trace!("Tick task {} finished", ctx.owner);
}
