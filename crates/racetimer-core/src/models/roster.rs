//! Roster of drivers shown next to the stopwatch

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Roster keyed by time-ordered keys, so iteration follows insertion order.
pub type Roster = BTreeMap<String, RosterEntry>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub name: String,
    pub car: String,
    pub team: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl RosterEntry {
    /// Create an entry from user input; fields are trimmed and all required.
    pub fn new(name: &str, car: &str, team: &str) -> Result<Self> {
        let entry = Self {
            name: name.trim().to_string(),
            car: car.trim().to_string(),
            team: team.trim().to_string(),
            created_at: Utc::now(),
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("name", &self.name), ("car", &self.car), ("team", &self.team)] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("Driver {} cannot be empty", field)));
            }
        }

        Ok(())
    }

    /// One-line summary, e.g. `Car 44 • Mercedes`.
    pub fn subtitle(&self) -> String {
        format!("Car {} • {}", self.car, self.team)
    }
}

/// Generate a roster key. Keys sort by creation time.
pub fn new_roster_key() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_trims_fields() {
        let entry = RosterEntry::new("  Lewis ", "44", " Mercedes").unwrap();
        assert_eq!(entry.name, "Lewis");
        assert_eq!(entry.car, "44");
        assert_eq!(entry.team, "Mercedes");
        assert_eq!(entry.subtitle(), "Car 44 • Mercedes");
    }

    #[test]
    fn test_all_fields_required() {
        assert!(RosterEntry::new("", "44", "Mercedes").is_err());
        assert!(RosterEntry::new("Lewis", "  ", "Mercedes").is_err());
        assert!(RosterEntry::new("Lewis", "44", "").is_err());
    }

    #[test]
    fn test_created_at_is_epoch_millis_on_the_wire() {
        let entry = RosterEntry::new("Max", "1", "Red Bull").unwrap();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value["createdAt"].as_i64(),
            Some(entry.created_at.timestamp_millis())
        );
    }

    #[test]
    fn test_keys_are_time_ordered() {
        let first = new_roster_key();
        let second = new_roster_key();
        assert!(first < second);

        let mut roster = Roster::new();
        roster.insert(second.clone(), RosterEntry::new("B", "2", "T").unwrap());
        roster.insert(first.clone(), RosterEntry::new("A", "1", "T").unwrap());
        let names: Vec<_> = roster.values().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
