//! The student roster and notification subscribers.

use serde::{Deserialize, Serialize};

use crate::event::{Direction, StudentId};

/// A roster entry for a monitored student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// The student's identifier (badge / face-pass ID).
    pub student_id: StudentId,
    /// Display name used in notification text.
    pub name: String,
}

impl Student {
    /// Creates a new roster entry.
    pub fn new(student_id: impl Into<StudentId>, name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
        }
    }
}

/// Per-subscriber notification preference flags.
///
/// `late_on` is part of the persisted contract but no pipeline component
/// triggers late-arrival notifications yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    /// Notify on entry events.
    pub entry_on: bool,
    /// Notify on exit events.
    pub exit_on: bool,
    /// Notify on late arrival (declared, never triggered).
    pub late_on: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            entry_on: true,
            exit_on: true,
            late_on: true,
        }
    }
}

impl NotificationPrefs {
    /// Whether an event in the given direction should be delivered.
    pub fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Entry => self.entry_on,
            Direction::Exit => self.exit_on,
        }
    }
}

/// The closed set of toggleable preference flags.
///
/// Toggles go through this enum rather than a string column name, so an
/// unknown flag is unrepresentable instead of a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKind {
    Entry,
    Exit,
    Late,
}

impl PrefKind {
    /// Column name in the subscribers table.
    pub fn column(&self) -> &'static str {
        match self {
            PrefKind::Entry => "entry_on",
            PrefKind::Exit => "exit_on",
            PrefKind::Late => "late_on",
        }
    }

    /// Parses a user-supplied flag name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Some(PrefKind::Entry),
            "exit" => Some(PrefKind::Exit),
            "late" => Some(PrefKind::Late),
            _ => None,
        }
    }
}

/// The closed set of editable profile fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Phone,
    StudentId,
    Language,
}

impl ProfileField {
    /// Column name in the subscribers table.
    pub fn column(&self) -> &'static str {
        match self {
            ProfileField::Name => "name",
            ProfileField::Phone => "phone",
            ProfileField::StudentId => "student_id",
            ProfileField::Language => "language",
        }
    }
}

/// A parent/guardian chat subscribed to one student's events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Telegram chat ID; primary key of the directory.
    pub chat_id: i64,
    /// Parent's display name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// The student this chat is linked to. A subscriber whose student is
    /// missing from the roster is "unlinked" and excluded from dispatch.
    pub student_id: StudentId,
    /// Preferred interface language.
    pub language: String,
    /// Notification preference flags.
    pub prefs: NotificationPrefs,
}

impl Subscriber {
    /// Creates a subscriber with default preferences (all on).
    pub fn new(
        chat_id: i64,
        name: impl Into<String>,
        phone: impl Into<String>,
        student_id: impl Into<StudentId>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            chat_id,
            name: name.into(),
            phone: phone.into(),
            student_id: student_id.into(),
            language: language.into(),
            prefs: NotificationPrefs::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefs_all_on() {
        let prefs = NotificationPrefs::default();
        assert!(prefs.entry_on);
        assert!(prefs.exit_on);
        assert!(prefs.late_on);
    }

    #[test]
    fn test_prefs_allow_by_direction() {
        let prefs = NotificationPrefs {
            entry_on: false,
            exit_on: true,
            late_on: true,
        };
        assert!(!prefs.allows(Direction::Entry));
        assert!(prefs.allows(Direction::Exit));
    }

    #[test]
    fn test_pref_kind_parse() {
        assert_eq!(PrefKind::parse("entry"), Some(PrefKind::Entry));
        assert_eq!(PrefKind::parse("Exit "), Some(PrefKind::Exit));
        assert_eq!(PrefKind::parse("late"), Some(PrefKind::Late));
        assert_eq!(PrefKind::parse("unknown"), None);
    }

    #[test]
    fn test_subscriber_defaults() {
        let sub = Subscriber::new(77, "Dilnoza", "+998901234567", "20201234", "uz");
        assert_eq!(sub.chat_id, 77);
        assert_eq!(sub.student_id.as_str(), "20201234");
        assert!(sub.prefs.entry_on);
    }
}
