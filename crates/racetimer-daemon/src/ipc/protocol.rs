use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiError;
use crate::events::StoreEvent;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const STORE_ERROR: i32 = -32000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<Value>,
    pub id: RequestId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: RequestId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

impl From<ApiError> for JsonRpcError {
    fn from(error: ApiError) -> Self {
        let code = match &error {
            ApiError::MethodNotFound(_) => METHOD_NOT_FOUND,
            ApiError::InvalidParams(_) | ApiError::Json(_) => INVALID_PARAMS,
            ApiError::Store(_) => STORE_ERROR,
        };
        Self::new(code, error.to_string())
    }
}

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(JsonRpcError::invalid_request("Invalid JSON-RPC version"));
        }
        Ok(())
    }
}

impl Response {
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(error: JsonRpcError, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

impl From<&StoreEvent> for Notification {
    fn from(event: &StoreEvent) -> Self {
        let (method, params) = event.to_notification_parts();
        Self::new(method, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TimerValueEvent;
    use racetimer_core::models::TimerRecord;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = Request::new("timer.get", None, RequestId::Number(1));

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"method\":\"timer.get\""));
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
    }

    #[test]
    fn test_request_validation() {
        let mut req = Request::new("server.time", None, RequestId::Null);
        assert!(req.validate().is_ok());

        req.jsonrpc = "1.0".to_string();
        assert_eq!(req.validate().unwrap_err().code, INVALID_REQUEST);
    }

    #[test]
    fn test_response_success() {
        let resp = Response::success(json!({"now": 123}), RequestId::Number(1));

        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_api_error_codes() {
        let err: JsonRpcError = ApiError::MethodNotFound("x.y".to_string()).into();
        assert_eq!(err.code, METHOD_NOT_FOUND);

        let err: JsonRpcError = ApiError::InvalidParams("bad".to_string()).into();
        assert_eq!(err.code, INVALID_PARAMS);

        let err: JsonRpcError = ApiError::Store("disk full".to_string()).into();
        assert_eq!(err.code, STORE_ERROR);
        assert!(err.message.contains("disk full"));
    }

    #[test]
    fn test_notification_from_event() {
        let event = StoreEvent::Timer(TimerValueEvent::new(Some(TimerRecord::zero())));
        let notif = Notification::from(&event);

        assert_eq!(notif.method, "timer.value");
        assert_eq!(notif.params["value"]["running"], false);
        assert_eq!(notif.params["value"]["startTime"], 0);
    }

    #[test]
    fn test_request_id_types() {
        let req1 = Request::new("test", None, RequestId::Number(42));
        let req2 = Request::new("test", None, RequestId::String("abc".to_string()));

        let json1 = serde_json::to_string(&req1).unwrap();
        let json2 = serde_json::to_string(&req2).unwrap();

        assert!(json1.contains("\"id\":42"));
        assert!(json2.contains("\"id\":\"abc\""));
    }
}
