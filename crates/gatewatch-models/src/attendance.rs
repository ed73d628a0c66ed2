//! Attendance summaries computed from raw events.
//!
//! Attendance is never stored: a day's presence is derived as the earliest
//! entry and the latest exit among that day's events.

use chrono::{DateTime, Utc};

use crate::event::{AccessEvent, Direction};

/// One student's presence for a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DaySummary {
    /// Earliest entry event of the day, if any.
    pub first_entry: Option<DateTime<Utc>>,
    /// Latest exit event of the day, if any.
    pub last_exit: Option<DateTime<Utc>>,
}

impl DaySummary {
    /// Whether the student was seen at all.
    pub fn present(&self) -> bool {
        self.first_entry.is_some() || self.last_exit.is_some()
    }
}

/// Folds a day's events into a summary. Input order does not matter.
pub fn summarize_day<'a>(events: impl IntoIterator<Item = &'a AccessEvent>) -> DaySummary {
    let mut summary = DaySummary::default();
    for event in events {
        match event.direction {
            Direction::Entry => {
                if summary.first_entry.map_or(true, |t| event.occurred_at < t) {
                    summary.first_entry = Some(event.occurred_at);
                }
            }
            Direction::Exit => {
                if summary.last_exit.map_or(true, |t| event.occurred_at > t) {
                    summary.last_exit = Some(event.occurred_at);
                }
            }
        }
    }
    summary
}
