//! Admin commands: countdown-gated start, stop and confirmed reset

use racetimer_core::models::{TimerConfig, TimerRecord, TimerWrite, WritePolicy};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};

use super::offset::ClockOffsetService;
use crate::store::{StoreError, TimerRecordStore};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Another writer changed the record between our read and write
    #[error("Timer was changed by another client")]
    Conflict,
}

pub type Result<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Reset,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// Answer to the reset prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The record was written
    Applied(TimerRecord),
    /// Nothing to do in the current state
    Skipped,
    /// The user declined
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandEvent {
    CountdownTick { remaining: u32 },
    Applied { command: Command, record: TimerRecord },
    Skipped { command: Command },
    Aborted { command: Command },
    Failed { command: Command, message: String },
}

/// Resets the countdown flag however `start` exits
struct CountdownGuard<'a>(&'a AtomicBool);

impl Drop for CountdownGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TimerCommandHandler {
    store: Arc<dyn TimerRecordStore>,
    offsets: Arc<ClockOffsetService>,
    countdown_seconds: u32,
    policy: WritePolicy,
    events: broadcast::Sender<CommandEvent>,
    counting_down: AtomicBool,
}

impl TimerCommandHandler {
    pub fn new(
        store: Arc<dyn TimerRecordStore>,
        offsets: Arc<ClockOffsetService>,
        countdown_seconds: u32,
        policy: WritePolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(64);

        Self {
            store,
            offsets,
            countdown_seconds,
            policy,
            events,
            counting_down: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        store: Arc<dyn TimerRecordStore>,
        offsets: Arc<ClockOffsetService>,
        config: &TimerConfig,
    ) -> Self {
        Self::new(store, offsets, config.countdown_seconds, config.write_policy)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CommandEvent> {
        self.events.subscribe()
    }

    pub fn is_counting_down(&self) -> bool {
        self.counting_down.load(Ordering::SeqCst)
    }

    /// Count down, then start the shared stopwatch from its current elapsed.
    ///
    /// Nothing is written during the countdown. A second start while one is
    /// counting down, or a start that finds the timer already running, is
    /// skipped.
    pub async fn start(&self) -> Result<CommandOutcome> {
        if self.counting_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("Start ignored, countdown already in progress");
            return self.report(Command::Start, Ok(CommandOutcome::Skipped));
        }
        let _guard = CountdownGuard(&self.counting_down);

        for remaining in (1..=self.countdown_seconds).rev() {
            let _ = self.events.send(CommandEvent::CountdownTick { remaining });
            sleep(Duration::from_secs(1)).await;
        }

        let result = self.write_start().await;
        self.report(Command::Start, result)
    }

    async fn write_start(&self) -> Result<CommandOutcome> {
        let current = self.store.read_timer().await?;
        if current.is_some_and(|record| record.running) {
            return Ok(CommandOutcome::Skipped);
        }

        let previous_elapsed = current.map(|record| record.elapsed).unwrap_or(0);
        let record = self
            .publish(current, TimerWrite::start(previous_elapsed))
            .await?;
        Ok(CommandOutcome::Applied(record))
    }

    /// Fold the running interval into `elapsed`. No-op unless running.
    pub async fn stop(&self) -> Result<CommandOutcome> {
        let result = self.write_stop().await;
        self.report(Command::Stop, result)
    }

    async fn write_stop(&self) -> Result<CommandOutcome> {
        let current = self.store.read_timer().await?;
        let Some(record) = current.filter(|record| record.running) else {
            return Ok(CommandOutcome::Skipped);
        };

        let store_now = self.offsets.store_now().await;
        let stopped = record.stopped_at(store_now);
        let record = self.publish(current, stopped.into()).await?;
        Ok(CommandOutcome::Applied(record))
    }

    /// Zero the record. Always unconditional once confirmed.
    pub async fn reset(&self, confirmation: Confirmation) -> Result<CommandOutcome> {
        let result = match confirmation {
            Confirmation::Declined => Ok(CommandOutcome::Aborted),
            Confirmation::Confirmed => self
                .store
                .write_timer(TimerWrite::reset())
                .await
                .map(CommandOutcome::Applied)
                .map_err(CommandError::from),
        };
        self.report(Command::Reset, result)
    }

    async fn publish(&self, expected: Option<TimerRecord>, write: TimerWrite) -> Result<TimerRecord> {
        match self.policy {
            WritePolicy::LastWriteWins => Ok(self.store.write_timer(write).await?),
            WritePolicy::CompareAndSet => self
                .store
                .update_timer_if_unchanged(expected, write)
                .await?
                .ok_or(CommandError::Conflict),
        }
    }

    fn report(&self, command: Command, result: Result<CommandOutcome>) -> Result<CommandOutcome> {
        let event = match &result {
            Ok(CommandOutcome::Applied(record)) => {
                tracing::info!("Timer {} applied: {:?}", command, record);
                CommandEvent::Applied {
                    command,
                    record: *record,
                }
            }
            Ok(CommandOutcome::Skipped) => {
                tracing::debug!("Timer {} skipped", command);
                CommandEvent::Skipped { command }
            }
            Ok(CommandOutcome::Aborted) => {
                tracing::debug!("Timer {} aborted by user", command);
                CommandEvent::Aborted { command }
            }
            Err(e) => {
                tracing::error!("Timer {} failed: {}", command, e);
                CommandEvent::Failed {
                    command,
                    message: e.to_string(),
                }
            }
        };
        let _ = self.events.send(event);
        result
    }
}
