pub mod config;
pub mod display;
pub mod roster;
pub mod snapshot;
pub mod timer;

pub use config::{Config, StoreConfig, TimerConfig, WritePolicy};
pub use display::{DisplayState, Presentation, TimerStatus};
pub use roster::{new_roster_key, Roster, RosterEntry};
pub use snapshot::StoreSnapshot;
pub use timer::{ServerValue, ServerValueKind, StartTime, TimerRecord, TimerWrite};
