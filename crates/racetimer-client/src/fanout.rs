//! Value fan-out to local subscribers

use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::store::{StoreError, StoreUpdate, Subscription};

/// One subscribable value.
///
/// Keeps the latest value so late subscribers start from it. Registration
/// and publication share one lock, so a subscriber never receives an older
/// value after a newer one.
pub struct Topic<T> {
    inner: Mutex<TopicState<T>>,
}

struct TopicState<T> {
    latest: Option<T>,
    subscribers: Vec<mpsc::UnboundedSender<StoreUpdate<T>>>,
}

impl<T: Clone> Topic<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TopicState {
                latest: None,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Register a subscriber, delivering the latest value if one is known
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(latest) = &state.latest {
            let _ = tx.send(StoreUpdate::Value(latest.clone()));
        }
        state.subscribers.push(tx);

        rx
    }

    pub fn publish(&self, value: T) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.latest = Some(value.clone());
        state
            .subscribers
            .retain(|tx| tx.send(StoreUpdate::Value(value.clone())).is_ok());
    }

    /// Tell every subscriber the feed failed. The cached value is dropped,
    /// since it can no longer be trusted to be current.
    pub fn publish_error(&self, error: StoreError) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.latest = None;
        state
            .subscribers
            .retain(|tx| tx.send(StoreUpdate::Error(error.clone())).is_ok());
    }

    pub fn latest(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

impl<T: Clone> Default for Topic<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_subscriber_gets_latest() {
        let topic = Topic::new();
        topic.publish(1);
        topic.publish(2);

        let mut rx = topic.subscribe();
        assert_eq!(rx.try_recv().unwrap(), StoreUpdate::Value(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_every_subscriber_gets_every_value() {
        let topic = Topic::new();
        let mut a = topic.subscribe();
        let mut b = topic.subscribe();

        topic.publish("x".to_string());

        assert_eq!(a.try_recv().unwrap(), StoreUpdate::Value("x".to_string()));
        assert_eq!(b.try_recv().unwrap(), StoreUpdate::Value("x".to_string()));
    }

    #[test]
    fn test_error_clears_latest() {
        let topic = Topic::new();
        let mut rx = topic.subscribe();
        topic.publish(5);
        topic.publish_error(StoreError::Unavailable("gone".to_string()));

        assert_eq!(rx.try_recv().unwrap(), StoreUpdate::Value(5));
        assert!(matches!(rx.try_recv().unwrap(), StoreUpdate::Error(_)));
        assert_eq!(topic.latest(), None);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let topic: Topic<u8> = Topic::new();
        let rx = topic.subscribe();
        let _keep = topic.subscribe();
        assert_eq!(topic.subscriber_count(), 2);

        drop(rx);
        topic.publish(1);
        assert_eq!(topic.subscriber_count(), 1);
    }
}
