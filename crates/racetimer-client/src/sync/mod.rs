//! Client-side synchronization core

pub mod commands;
pub mod engine;
pub mod offset;

pub use commands::{
    Command, CommandError, CommandEvent, CommandOutcome, Confirmation, TimerCommandHandler,
};
pub use engine::TimerSyncEngine;
pub use offset::ClockOffsetService;

#[cfg(test)]
pub(crate) mod testing {
    use racetimer_core::clock::Clock;
    use tokio::time::Instant;

    /// Local clock that follows tokio's (pausable) time
    #[derive(Debug)]
    pub struct TokioClock {
        base_millis: i64,
        started: Instant,
    }

    impl TokioClock {
        pub fn new(base_millis: i64) -> Self {
            Self {
                base_millis,
                started: Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now_millis(&self) -> i64 {
            self.base_millis + self.started.elapsed().as_millis() as i64
        }
    }
}
