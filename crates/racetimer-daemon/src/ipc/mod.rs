//! IPC module for store communication

pub mod connection;
pub mod protocol;
pub mod server;

pub use connection::ConnectionError;
pub use protocol::{JsonRpcError, Notification, Request, RequestId, Response};
pub use server::{IpcServer, SUBSCRIBE_METHOD};
