//! Append-only timeline of clinical actions.
//!
//! Entries are stamped with the time of day when they are appended and are
//! never edited or removed individually. `clear` drops everything at once.
//! Ordering is append order; day rollover is not handled, so a session that
//! crosses midnight shows `23:59:59` followed by `00:00:00`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{format_time_of_day, Clock};

pub const CODE_STARTED: &str = "Code timer started";
pub const CODE_PAUSED: &str = "Code timer paused";
pub const CODE_ENDED: &str = "Code timer ended";
pub const COMPRESSIONS_STARTED: &str = "Chest compressions started";
pub const EPINEPHRINE_GIVEN: &str = "Epinephrine given";
pub const EPINEPHRINE_REMINDER: &str = "Epinephrine reminder";
pub const EPINEPHRINE_REMINDERS_CANCELLED: &str = "Epinephrine reminders cancelled";
pub const SHOCK_DELIVERED: &str = "Shock delivered";
pub const RHYTHM_CHECKED: &str = "Rhythm checked";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    pub timestamp: String,
    pub description: String,
}

pub struct EventLog {
    clock: Arc<dyn Clock>,
    entries: Vec<EventLogEntry>,
}

impl EventLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, description: impl Into<String>) -> &EventLogEntry {
        let entry = EventLogEntry {
            timestamp: format_time_of_day(self.clock.time_of_day()),
            description: description.into(),
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn append_stamps_with_current_time_of_day() {
        let clock = Arc::new(ManualClock::at(14, 3, 0));
        let mut log = EventLog::new(clock.clone());

        log.append(CODE_STARTED);
        clock.advance_secs(65);
        log.append(SHOCK_DELIVERED);

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "14:03:00");
        assert_eq!(entries[0].description, CODE_STARTED);
        assert_eq!(entries[1].timestamp, "14:04:05");
        assert_eq!(entries[1].description, SHOCK_DELIVERED);
    }

    #[test]
    fn clear_empties_and_appends_continue_afterwards() {
        let mut log = EventLog::new(Arc::new(ManualClock::at(9, 0, 0)));
        log.append(CODE_STARTED);
        log.append(EPINEPHRINE_GIVEN);

        log.clear();
        assert!(log.is_empty());

        log.append(RHYTHM_CHECKED);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].description, RHYTHM_CHECKED);
    }

    #[test]
    fn entries_serialize_camel_case() {
        let entry = EventLogEntry {
            timestamp: "10:00:00".into(),
            description: CODE_PAUSED.into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["timestamp"], "10:00:00");
        assert_eq!(json["description"], CODE_PAUSED);
    }
}
