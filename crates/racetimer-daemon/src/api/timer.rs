//! Timer record API methods

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_params, ApiError, Result};
use crate::store::RealtimeStore;
use racetimer_core::models::{TimerRecord, TimerWrite};

#[derive(Debug, Deserialize)]
struct SetParams {
    value: TimerWrite,
}

#[derive(Debug, Deserialize)]
struct UpdateIfUnchangedParams {
    expected: Option<TimerRecord>,
    value: TimerWrite,
}

/// Read the timer record (null when never written)
pub async fn get(store: &Arc<RealtimeStore>) -> Result<Value> {
    let value = store.get_timer().await;
    Ok(json!({ "value": value }))
}

/// Overwrite the timer record
pub async fn set(store: &Arc<RealtimeStore>, params: Option<Value>) -> Result<Value> {
    let params: SetParams = parse_params(params)?;

    let record = store
        .set_timer(params.value)
        .await
        .map_err(|e| ApiError::Store(e.to_string()))?;

    Ok(json!({ "value": record }))
}

/// Overwrite the timer record if it still matches `expected`
pub async fn update_if_unchanged(
    store: &Arc<RealtimeStore>,
    params: Option<Value>,
) -> Result<Value> {
    let params: UpdateIfUnchangedParams = parse_params(params)?;

    let (committed, current) = store
        .update_timer_if_unchanged(params.expected, params.value)
        .await
        .map_err(|e| ApiError::Store(e.to_string()))?;

    Ok(json!({
        "committed": committed,
        "value": current
    }))
}
