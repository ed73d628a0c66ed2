//! Table definitions.
//!
//! Boolean preference flags are stored as 0/1 integers. Event timestamps
//! are RFC 3339 UTC strings, so lexicographic `BETWEEN` matches
//! chronological order.

/// Schema applied on every open; idempotent.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    student_id  TEXT NOT NULL,
    direction   TEXT NOT NULL,
    event_time  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_time ON events(event_time);
CREATE INDEX IF NOT EXISTS idx_events_student ON events(student_id, event_time);

CREATE TABLE IF NOT EXISTS subscribers (
    chat_id     INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL,
    student_id  TEXT NOT NULL,
    language    TEXT NOT NULL,
    entry_on    INTEGER NOT NULL DEFAULT 1,
    exit_on     INTEGER NOT NULL DEFAULT 1,
    late_on     INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS students (
    student_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL
);
";
