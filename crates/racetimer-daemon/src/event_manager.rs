//! Central event management and broadcasting

use tokio::sync::broadcast;

use crate::events::{RosterValueEvent, StoreEvent, TimerValueEvent};

/// Fans store changes out to every connected subscriber
pub struct EventManager {
    event_tx: broadcast::Sender<StoreEvent>,
}

impl EventManager {
    /// Create a new event manager with a broadcast channel
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1000);
        Self { event_tx }
    }

    /// Subscribe to all store events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Emit a timer value event
    pub fn emit_timer(&self, event: TimerValueEvent) {
        tracing::debug!(
            "EventManager: timer value {:?} to {} subscribers",
            event.value,
            self.event_tx.receiver_count()
        );
        let _ = self.event_tx.send(StoreEvent::Timer(event));
    }

    /// Emit a roster value event
    pub fn emit_roster(&self, event: RosterValueEvent) {
        tracing::debug!(
            "EventManager: roster value ({} entries) to {} subscribers",
            event.value.len(),
            self.event_tx.receiver_count()
        );
        let _ = self.event_tx.send(StoreEvent::Roster(event));
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racetimer_core::models::{Roster, TimerRecord};

    #[test]
    fn test_event_manager_creation() {
        let manager = EventManager::new();
        let _receiver = manager.subscribe();
    }

    #[tokio::test]
    async fn test_timer_event_broadcasting() {
        let manager = EventManager::new();
        let mut receiver = manager.subscribe();

        manager.emit_timer(TimerValueEvent::new(Some(TimerRecord::zero())));

        let received = receiver.recv().await.unwrap();
        assert!(matches!(received, StoreEvent::Timer(_)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let manager = EventManager::new();
        let mut receiver1 = manager.subscribe();
        let mut receiver2 = manager.subscribe();

        manager.emit_roster(RosterValueEvent::new(Roster::new()));

        // Both subscribers should receive the event
        let received1 = receiver1.recv().await.unwrap();
        let received2 = receiver2.recv().await.unwrap();

        assert!(matches!(received1, StoreEvent::Roster(_)));
        assert!(matches!(received2, StoreEvent::Roster(_)));
    }
}
