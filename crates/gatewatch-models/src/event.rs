//! Access events recorded at the facility gate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a monitored student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// Creates an ID from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StudentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StudentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StudentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Direction of a gate passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The student entered the facility.
    Entry,
    /// The student left the facility.
    Exit,
}

impl Direction {
    /// Canonical lowercase label, as stored in the events table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        }
    }

    /// Human-readable label for notification text.
    pub fn display_label(&self) -> &'static str {
        match self {
            Direction::Entry => "Entered",
            Direction::Exit => "Exited",
        }
    }

    /// Parses a direction from the status labels the device and the feed
    /// use. Devices in the field report a handful of spellings, so this is
    /// deliberately lenient; unknown labels return `None` and the record
    /// is treated as malformed.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "entry" | "enter" | "entered" | "in" => Some(Direction::Entry),
            "exit" | "leave" | "left" | "out" => Some(Direction::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single gate passage: who, which way, and when.
///
/// Immutable once stored. Multiple events per student per day are normal;
/// attendance is computed from the full day, not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// The student this event pertains to.
    pub student_id: StudentId,
    /// Entry or exit.
    pub direction: Direction,
    /// When the passage happened. Ordering key for the watermark.
    pub occurred_at: DateTime<Utc>,
}

impl AccessEvent {
    /// Creates a new event.
    pub fn new(
        student_id: impl Into<StudentId>,
        direction: Direction,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            direction,
            occurred_at,
        }
    }
}
