//! API handlers

pub mod roster;
pub mod timer;

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::event_manager::EventManager;
use crate::events::StoreEvent;
use crate::store::RealtimeStore;

/// API error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Main API handler that routes requests to appropriate handlers
pub struct ApiHandler {
    event_manager: Arc<EventManager>,
    store: Arc<RealtimeStore>,
}

impl ApiHandler {
    pub fn new(event_manager: Arc<EventManager>, store: Arc<RealtimeStore>) -> Self {
        Self {
            event_manager,
            store,
        }
    }

    /// Subscribe to store change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_manager.subscribe()
    }

    /// Current values, in the shape of the notifications that follow them
    pub async fn initial_events(&self) -> Vec<StoreEvent> {
        use crate::events::{RosterValueEvent, TimerValueEvent};

        let snapshot = self.store.snapshot().await;
        vec![
            StoreEvent::Timer(TimerValueEvent::new(snapshot.timer)),
            StoreEvent::Roster(RosterValueEvent::new(snapshot.roster)),
        ]
    }

    /// Handle an API request
    pub async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value> {
        match method {
            "server.time" => Ok(json!({ "now": self.store.server_time() })),

            "timer.get" => timer::get(&self.store).await,
            "timer.set" => timer::set(&self.store, params).await,
            "timer.update_if_unchanged" => timer::update_if_unchanged(&self.store, params).await,

            "roster.list" => roster::list(&self.store).await,
            "roster.push" => roster::push(&self.store, params).await,
            "roster.remove" => roster::remove(&self.store, params).await,
            "roster.clear" => roster::clear(&self.store).await,

            _ => Err(ApiError::MethodNotFound(method.to_string())),
        }
    }
}

/// Deserialize required params
pub(crate) fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T> {
    let params = params.ok_or_else(|| ApiError::InvalidParams("Missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| ApiError::InvalidParams(e.to_string()))
}
