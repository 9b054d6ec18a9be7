//! JSON-RPC protocol definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    jsonrpc: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ResponseError>,
    pub id: RequestId,
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 2.0 Notification (no id field)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

/// Request ID (can be string, number, or null)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    Null,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A line read from the daemon
#[derive(Debug, Clone)]
pub enum Incoming {
    Notification(Notification),
    Response(Response),
}

impl Incoming {
    /// Classify a line: notifications carry a method and no id.
    pub fn parse(line: &str) -> Option<Self> {
        if let Ok(notification) = serde_json::from_str::<Notification>(line) {
            return Some(Incoming::Notification(notification));
        }
        serde_json::from_str::<Response>(line)
            .ok()
            .map(Incoming::Response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_creation() {
        let req = Request::new("timer.get", None, RequestId::Number(1));
        assert_eq!(req.method, "timer.get");
        assert_eq!(req.id, RequestId::Number(1));
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_parse_notification() {
        let line = r#"{"jsonrpc":"2.0","method":"timer.value","params":{"value":null}}"#;
        assert!(matches!(
            Incoming::parse(line),
            Some(Incoming::Notification(n)) if n.method == "timer.value"
        ));
    }

    #[test]
    fn test_parse_response() {
        let line = r#"{"jsonrpc":"2.0","result":{"now":5},"id":3}"#;
        match Incoming::parse(line) {
            Some(Incoming::Response(r)) => {
                assert_eq!(r.id, RequestId::Number(3));
                assert_eq!(r.result.unwrap()["now"], 5);
            }
            other => panic!("Expected response, got {:?}", other),
        }

        let line = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"nope"},"id":4}"#;
        match Incoming::parse(line) {
            Some(Incoming::Response(r)) => assert_eq!(r.error.unwrap().code, -32601),
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Incoming::parse("not json").is_none());
    }
}
