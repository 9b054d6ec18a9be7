//! RaceTimer Store Daemon Library
//!
//! The realtime store every client synchronizes against, exposed as a
//! library for testing.

pub mod api;
pub mod event_manager;
pub mod events;
pub mod ipc;
pub mod store;

pub use api::ApiHandler;
pub use event_manager::EventManager;
pub use events::StoreEvent;
pub use ipc::{IpcServer, Notification, Request, Response};
pub use store::RealtimeStore;
