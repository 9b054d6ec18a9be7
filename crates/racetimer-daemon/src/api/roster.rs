//! Roster API methods

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_params, ApiError, Result};
use crate::store::{RealtimeStore, RealtimeStoreError};
use racetimer_core::models::RosterEntry;

#[derive(Debug, Deserialize)]
struct PushParams {
    entry: RosterEntry,
}

#[derive(Debug, Deserialize)]
struct KeyParams {
    key: String,
}

fn store_error(e: RealtimeStoreError) -> ApiError {
    match e {
        RealtimeStoreError::Invalid(msg) => ApiError::InvalidParams(msg),
        other => ApiError::Store(other.to_string()),
    }
}

pub async fn list(store: &Arc<RealtimeStore>) -> Result<Value> {
    let roster = store.list_roster().await;
    Ok(json!({ "value": roster }))
}

pub async fn push(store: &Arc<RealtimeStore>, params: Option<Value>) -> Result<Value> {
    let params: PushParams = parse_params(params)?;
    let entry = params.entry;

    let key = store.push_roster(entry.clone()).await.map_err(store_error)?;

    Ok(json!({
        "key": key,
        "entry": entry
    }))
}

pub async fn remove(store: &Arc<RealtimeStore>, params: Option<Value>) -> Result<Value> {
    let params: KeyParams = parse_params(params)?;

    let removed = store.remove_roster(&params.key).await.map_err(store_error)?;

    Ok(json!({ "removed": removed }))
}

pub async fn clear(store: &Arc<RealtimeStore>) -> Result<Value> {
    let removed = store.clear_roster().await.map_err(store_error)?;
    Ok(json!({ "removed": removed }))
}
