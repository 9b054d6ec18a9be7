pub mod manager;

pub use manager::{RealtimeStore, RealtimeStoreError};
