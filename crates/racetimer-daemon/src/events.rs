use chrono::{DateTime, Utc};
use racetimer_core::models::{Roster, TimerRecord};
use serde::{Deserialize, Serialize};

/// Change notification carrying the full new value, not a delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum StoreEvent {
    Timer(TimerValueEvent),
    Roster(RosterValueEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerValueEvent {
    pub value: Option<TimerRecord>,
    pub timestamp: DateTime<Utc>,
}

impl TimerValueEvent {
    pub fn new(value: Option<TimerRecord>) -> Self {
        Self {
            value,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterValueEvent {
    pub value: Roster,
    pub timestamp: DateTime<Utc>,
}

impl RosterValueEvent {
    pub fn new(value: Roster) -> Self {
        Self {
            value,
            timestamp: Utc::now(),
        }
    }
}

impl StoreEvent {
    /// JSON-RPC notification method and params for this event.
    pub fn to_notification_parts(&self) -> (&'static str, serde_json::Value) {
        match self {
            StoreEvent::Timer(e) => ("timer.value", serde_json::json!({ "value": e.value })),
            StoreEvent::Roster(e) => ("roster.value", serde_json::json!({ "value": e.value })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racetimer_core::models::{new_roster_key, RosterEntry};

    #[test]
    fn test_timer_event_serialization() {
        let record = TimerRecord {
            running: true,
            start_time: 1000,
            elapsed: 500,
        };
        let event = StoreEvent::Timer(TimerValueEvent::new(Some(record)));
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: StoreEvent = serde_json::from_str(&json).unwrap();

        match deserialized {
            StoreEvent::Timer(e) => assert_eq!(e.value, Some(record)),
            _ => panic!("Expected timer event"),
        }
    }

    #[test]
    fn test_notification_parts() {
        let event = StoreEvent::Timer(TimerValueEvent::new(None));
        let (method, params) = event.to_notification_parts();
        assert_eq!(method, "timer.value");
        assert!(params["value"].is_null());

        let mut roster = Roster::new();
        roster.insert(new_roster_key(), RosterEntry::new("Oscar", "81", "McLaren").unwrap());
        let event = StoreEvent::Roster(RosterValueEvent::new(roster));
        let (method, params) = event.to_notification_parts();
        assert_eq!(method, "roster.value");
        assert_eq!(params["value"].as_object().unwrap().len(), 1);
    }
}
