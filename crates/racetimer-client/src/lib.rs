//! RaceTimer Client Library
//!
//! Talks to the RaceTimer daemon over its Unix socket and hosts the
//! client-side synchronization core: clock offset estimation, the display
//! engine and the start/stop/reset command handler.

pub mod fanout;
pub mod memory;
pub mod protocol;
pub mod store;
pub mod sync;

use async_trait::async_trait;
use racetimer_core::clock::{Clock, SystemClock};
use racetimer_core::models::{Roster, RosterEntry, TimerRecord, TimerWrite};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf,
};
use tokio::net::UnixStream;
use tokio::sync::{oneshot, Mutex, RwLock};

use fanout::Topic;
use protocol::{Incoming, Notification, Request, RequestId, Response};
use store::{Result, RosterStore, StoreError, Subscription, TimerRecordStore};

pub use memory::MemoryStore;
pub use store::StoreUpdate;
pub use sync::{ClockOffsetService, TimerCommandHandler, TimerSyncEngine};

/// Method that switches the connection into push mode
pub const SUBSCRIBE_METHOD: &str = "store.subscribe";

/// First reconnect delay after the push connection drops
const RECONNECT_BASE_DELAY_MS: u64 = 100;

/// Upper bound for the reconnect delay
const RECONNECT_MAX_DELAY_MS: u64 = 2_000;

type PendingResponses = Arc<RwLock<HashMap<i64, oneshot::Sender<Response>>>>;

/// Persistent connection state
struct PersistentConnection {
    writer: Arc<Mutex<BufWriter<WriteHalf<UnixStream>>>>,
    pending_responses: PendingResponses,
}

/// State shared between the client and its connection tasks
struct Inner {
    socket_path: String,
    request_counter: AtomicI64,
    persistent_conn: Mutex<Option<PersistentConnection>>,
    timer_topic: Arc<Topic<Option<TimerRecord>>>,
    roster_topic: Arc<Topic<Roster>>,
}

/// RaceTimer daemon client
///
/// Once subscribed, the client keeps its push connection alive: when the
/// daemon goes away subscribers receive `Unavailable`, and the client keeps
/// reconnecting with backoff until the daemon answers again. Fresh values
/// then flow into the same subscriptions.
pub struct StoreClient {
    inner: Arc<Inner>,
    clock: Arc<dyn Clock>,
}

impl StoreClient {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self::with_clock(socket_path, Arc::new(SystemClock))
    }

    /// Create a client whose local clock is `clock` (used for offset estimation)
    pub fn with_clock(socket_path: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                socket_path: socket_path.into(),
                request_counter: AtomicI64::new(1),
                persistent_conn: Mutex::new(None),
                timer_topic: Arc::new(Topic::new()),
                roster_topic: Arc::new(Topic::new()),
            }),
            clock,
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.inner.socket_path
    }

    /// Open the persistent connection and ask the daemon to push changes.
    ///
    /// Pushed values land in the timer and roster topics. Calling this again
    /// while connected is a no-op.
    pub async fn subscribe_notifications(&self) -> Result<()> {
        self.inner.open_notifications().await
    }

    /// Send a request and receive a response.
    /// Uses the persistent connection when one is open.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.inner.call_persistent(method, params).await
    }

    // Clock

    /// Store clock reading in epoch milliseconds
    pub async fn server_time(&self) -> Result<i64> {
        let result = self.call("server.time", None).await?;
        field(result, "now")
    }

    // Timer methods

    pub async fn timer_get(&self) -> Result<Option<TimerRecord>> {
        let result = self.call("timer.get", None).await?;
        field(result, "value")
    }

    pub async fn timer_set(&self, value: TimerWrite) -> Result<TimerRecord> {
        let result = self
            .call("timer.set", Some(json!({ "value": value })))
            .await?;
        field(result, "value")
    }

    /// Returns whether the write committed and the record as it now stands
    pub async fn timer_update_if_unchanged(
        &self,
        expected: Option<TimerRecord>,
        value: TimerWrite,
    ) -> Result<(bool, Option<TimerRecord>)> {
        let result = self
            .call(
                "timer.update_if_unchanged",
                Some(json!({
                    "expected": expected,
                    "value": value,
                })),
            )
            .await?;

        let committed: bool = field(result.clone(), "committed")?;
        let current: Option<TimerRecord> = field(result, "value")?;
        Ok((committed, current))
    }

    // Roster methods

    pub async fn roster_list(&self) -> Result<Roster> {
        let result = self.call("roster.list", None).await?;
        field(result, "value")
    }

    pub async fn roster_push(&self, entry: &RosterEntry) -> Result<String> {
        let result = self
            .call("roster.push", Some(json!({ "entry": entry })))
            .await?;
        field(result, "key")
    }

    pub async fn roster_remove(&self, key: &str) -> Result<bool> {
        let result = self
            .call("roster.remove", Some(json!({ "key": key })))
            .await?;
        field(result, "removed")
    }

    pub async fn roster_clear(&self) -> Result<usize> {
        let result = self.call("roster.clear", None).await?;
        field(result, "removed")
    }
}

impl Inner {
    async fn open_notifications(self: &Arc<Self>) -> Result<()> {
        {
            let mut conn_lock = self.persistent_conn.lock().await;
            if conn_lock.is_some() {
                return Ok(());
            }

            let stream = self.connect().await?;
            let (read_half, write_half) = tokio::io::split(stream);
            let pending_responses: PendingResponses = Arc::new(RwLock::new(HashMap::new()));

            tokio::spawn(read_connection(
                read_half,
                pending_responses.clone(),
                self.timer_topic.clone(),
                self.roster_topic.clone(),
                Arc::downgrade(self),
            ));

            *conn_lock = Some(PersistentConnection {
                writer: Arc::new(Mutex::new(BufWriter::new(write_half))),
                pending_responses,
            });
        }

        self.call_persistent(SUBSCRIBE_METHOD, None).await?;
        tracing::debug!("Subscribed to store notifications");
        Ok(())
    }

    /// Send a request using the persistent connection (if available)
    async fn call_persistent(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let handles = {
            let conn_lock = self.persistent_conn.lock().await;
            conn_lock
                .as_ref()
                .map(|conn| (conn.writer.clone(), conn.pending_responses.clone()))
        };

        let Some((writer, pending_responses)) = handles else {
            return self.call_oneshot(method, params).await;
        };

        let request_id = self.next_id();
        let request = Request::new(method, params, RequestId::Number(request_id));

        let (tx, rx) = oneshot::channel::<Response>();
        pending_responses.write().await.insert(request_id, tx);

        let sent = {
            let mut writer = writer.lock().await;
            write_line(&mut *writer, &request).await
        };
        if let Err(e) = sent {
            pending_responses.write().await.remove(&request_id);
            return Err(e);
        }

        let response = rx
            .await
            .map_err(|_| StoreError::Unavailable("No response received".to_string()))?;

        into_result(response)
    }

    /// Send a one-shot request (creates new connection)
    async fn call_oneshot(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let mut stream = self.connect().await?;
        let request = Request::new(method, params, RequestId::Number(self.next_id()));

        write_line(&mut stream, &request).await?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await.map_err(unavailable)?;
        if bytes_read == 0 {
            return Err(StoreError::Unavailable(
                "Connection closed before response".to_string(),
            ));
        }

        let response: Response =
            serde_json::from_str(&line).map_err(|e| StoreError::InvalidData(e.to_string()))?;

        into_result(response)
    }

    async fn connect(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.socket_path).await.map_err(|e| {
            StoreError::Unavailable(format!("Cannot connect to {}: {}", self.socket_path, e))
        })
    }

    fn next_id(&self) -> i64 {
        self.request_counter.fetch_add(1, Ordering::SeqCst)
    }
}

/// Route responses and notifications from the push connection until it
/// closes, then start reconnecting.
async fn read_connection(
    read_half: ReadHalf<UnixStream>,
    pending_responses: PendingResponses,
    timer_topic: Arc<Topic<Option<TimerRecord>>>,
    roster_topic: Arc<Topic<Roster>>,
    inner: Weak<Inner>,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Err(e) => {
                tracing::warn!("Connection read failed: {}", e);
                break;
            }
            Ok(_) => match Incoming::parse(&line) {
                Some(Incoming::Notification(notification)) => {
                    dispatch_notification(notification, &timer_topic, &roster_topic);
                }
                Some(Incoming::Response(response)) => {
                    if let RequestId::Number(id) = response.id {
                        if let Some(tx) = pending_responses.write().await.remove(&id) {
                            let _ = tx.send(response);
                        }
                    }
                }
                None => tracing::warn!("Ignoring unparseable line from daemon"),
            },
        }
    }

    tracing::info!("Connection to daemon closed");
    // Dropping the senders fails every in-flight call
    pending_responses.write().await.clear();
    match inner.upgrade() {
        Some(inner) => *inner.persistent_conn.lock().await = None,
        None => return,
    }

    let error = StoreError::Unavailable("connection closed".to_string());
    timer_topic.publish_error(error.clone());
    roster_topic.publish_error(error);

    reconnect(inner).await;
}

/// Reopen the push connection until it succeeds or the client is dropped
fn reconnect(inner: Weak<Inner>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let mut attempt: u32 = 0;
        loop {
            tokio::time::sleep(reconnect_delay(attempt)).await;

            let Some(inner) = inner.upgrade() else {
                tracing::debug!("Client dropped, giving up on reconnect");
                return;
            };
            match inner.open_notifications().await {
                Ok(()) => {
                    tracing::info!("Reconnected to daemon after {} attempts", attempt + 1);
                    return;
                }
                Err(e) => {
                    tracing::debug!("Reconnect attempt {} failed: {}", attempt + 1, e);
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    })
}

/// Exponential backoff: `base * 2^attempt`, capped
fn reconnect_delay(attempt: u32) -> Duration {
    let millis = RECONNECT_BASE_DELAY_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(RECONNECT_MAX_DELAY_MS);
    Duration::from_millis(millis)
}

#[async_trait]
impl TimerRecordStore for StoreClient {
    async fn subscribe_timer(&self) -> Result<Subscription<Option<TimerRecord>>> {
        self.subscribe_notifications().await?;
        Ok(self.inner.timer_topic.subscribe())
    }

    async fn read_timer(&self) -> Result<Option<TimerRecord>> {
        self.timer_get().await
    }

    async fn write_timer(&self, value: TimerWrite) -> Result<TimerRecord> {
        self.timer_set(value).await
    }

    async fn update_timer_if_unchanged(
        &self,
        expected: Option<TimerRecord>,
        value: TimerWrite,
    ) -> Result<Option<TimerRecord>> {
        let (committed, current) = self.timer_update_if_unchanged(expected, value).await?;
        Ok(if committed { current } else { None })
    }

    async fn server_offset(&self) -> Result<i64> {
        let sent = self.clock.now_millis();
        let server_now = self.server_time().await?;
        let received = self.clock.now_millis();

        // Assume the server read its clock halfway through the round trip
        let midpoint = sent + (received - sent) / 2;
        Ok(server_now - midpoint)
    }
}

#[async_trait]
impl RosterStore for StoreClient {
    async fn subscribe_roster(&self) -> Result<Subscription<Roster>> {
        self.subscribe_notifications().await?;
        Ok(self.inner.roster_topic.subscribe())
    }

    async fn read_roster(&self) -> Result<Roster> {
        self.roster_list().await
    }

    async fn push_entry(&self, entry: RosterEntry) -> Result<String> {
        self.roster_push(&entry).await
    }

    async fn remove_entry(&self, key: &str) -> Result<bool> {
        self.roster_remove(key).await
    }

    async fn remove_all(&self) -> Result<usize> {
        self.roster_clear().await
    }
}

fn dispatch_notification(
    notification: Notification,
    timer_topic: &Topic<Option<TimerRecord>>,
    roster_topic: &Topic<Roster>,
) {
    tracing::trace!("Notification: {}", notification.method);

    match notification.method.as_str() {
        "timer.value" => match field::<Option<TimerRecord>>(notification.params, "value") {
            Ok(value) => timer_topic.publish(value),
            Err(e) => timer_topic.publish_error(e),
        },
        "roster.value" => match field::<Roster>(notification.params, "value") {
            Ok(value) => roster_topic.publish(value),
            Err(e) => roster_topic.publish_error(e),
        },
        other => tracing::debug!("Ignoring notification {}", other),
    }
}

async fn write_line<W>(writer: &mut W, request: &Request) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let request_json =
        serde_json::to_string(request).map_err(|e| StoreError::InvalidData(e.to_string()))?;
    writer
        .write_all(request_json.as_bytes())
        .await
        .map_err(unavailable)?;
    writer.write_all(b"\n").await.map_err(unavailable)?;
    writer.flush().await.map_err(unavailable)?;
    Ok(())
}

fn into_result(response: Response) -> Result<Value> {
    if let Some(error) = response.error {
        return Err(StoreError::Rejected {
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// Decode one field of a result object
fn field<T: DeserializeOwned>(mut result: Value, name: &str) -> Result<T> {
    let value = result.get_mut(name).map(Value::take).unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| StoreError::InvalidData(format!("field '{}': {}", name, e)))
}

fn unavailable(e: std::io::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_decoding() {
        let result = json!({ "now": 42, "value": null });
        assert_eq!(field::<i64>(result.clone(), "now").unwrap(), 42);
        assert_eq!(
            field::<Option<TimerRecord>>(result.clone(), "value").unwrap(),
            None
        );
        assert!(matches!(
            field::<i64>(result, "missing"),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_error_response_is_rejected() {
        let response: Response = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"bad"},"id":1}"#,
        )
        .unwrap();
        assert_eq!(
            into_result(response),
            Err(StoreError::Rejected {
                code: -32602,
                message: "bad".to_string()
            })
        );
    }

    #[test]
    fn test_dispatch_routes_by_method() {
        let timer_topic = Topic::new();
        let roster_topic = Topic::new();
        let mut timer_rx = timer_topic.subscribe();
        let mut roster_rx = roster_topic.subscribe();

        let notification: Notification = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "timer.value",
            "params": {"value": {"running": false, "startTime": 0, "elapsed": 1500}}
        }))
        .unwrap();
        dispatch_notification(notification, &timer_topic, &roster_topic);

        let notification: Notification = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "roster.value",
            "params": {"value": "not a roster"}
        }))
        .unwrap();
        dispatch_notification(notification, &timer_topic, &roster_topic);

        match timer_rx.try_recv().unwrap() {
            StoreUpdate::Value(Some(record)) => assert_eq!(record.elapsed, 1500),
            other => panic!("Expected timer value, got {:?}", other),
        }
        assert!(matches!(
            roster_rx.try_recv().unwrap(),
            StoreUpdate::Error(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_reconnect_delay_backs_off_to_cap() {
        assert_eq!(reconnect_delay(0), Duration::from_millis(100));
        assert_eq!(reconnect_delay(1), Duration::from_millis(200));
        assert_eq!(reconnect_delay(3), Duration::from_millis(800));
        assert_eq!(reconnect_delay(5), Duration::from_millis(2_000));
        assert_eq!(reconnect_delay(u32::MAX), Duration::from_millis(2_000));
    }

    #[tokio::test]
    async fn test_unreachable_socket_is_unavailable() {
        let client = StoreClient::new("/nonexistent/racetimer-test.sock");
        assert!(matches!(
            client.server_time().await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
