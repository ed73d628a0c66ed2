//! [`AttendanceStore`] — the SQLite-backed event log and subscriber directory.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use gatewatch_models::{
    AccessEvent, Direction, NotificationPrefs, PrefKind, ProfileField, Student, StudentId,
    Subscriber,
};

use crate::error::{Result, StoreError};
use crate::schema::SCHEMA;

/// Encodes a timestamp the way the events table stores it.
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decodes a stored timestamp.
fn decode_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(raw.to_string()))
}

/// Raw event row, decoded outside the connection task.
struct RawEventRow {
    student_id: String,
    direction: String,
    event_time: String,
}

impl RawEventRow {
    fn into_event(self) -> Result<AccessEvent> {
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| StoreError::InvalidDirection(self.direction.clone()))?;
        Ok(AccessEvent {
            student_id: StudentId::from_string(self.student_id),
            direction,
            occurred_at: decode_ts(&self.event_time)?,
        })
    }
}

/// Raw subscriber row.
struct RawSubscriberRow {
    chat_id: i64,
    name: String,
    phone: String,
    student_id: String,
    language: String,
    entry_on: i64,
    exit_on: i64,
    late_on: i64,
}

impl RawSubscriberRow {
    fn into_subscriber(self) -> Subscriber {
        Subscriber {
            chat_id: self.chat_id,
            name: self.name,
            phone: self.phone,
            student_id: StudentId::from_string(self.student_id),
            language: self.language,
            prefs: NotificationPrefs {
                entry_on: self.entry_on != 0,
                exit_on: self.exit_on != 0,
                late_on: self.late_on != 0,
            },
        }
    }
}

fn read_subscriber_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubscriberRow> {
    Ok(RawSubscriberRow {
        chat_id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        student_id: row.get(3)?,
        language: row.get(4)?,
        entry_on: row.get(5)?,
        exit_on: row.get(6)?,
        late_on: row.get(7)?,
    })
}

const SUBSCRIBER_COLUMNS: &str =
    "chat_id, name, phone, student_id, language, entry_on, exit_on, late_on";

/// The Gatewatch store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is shared. Every operation is a
/// single statement or a single connection call, so concurrent callers
/// never observe partial writes.
#[derive(Clone)]
pub struct AttendanceStore {
    conn: tokio_rusqlite::Connection,
}

impl AttendanceStore {
    /// Opens (or creates) a store at `path` and applies the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// Opens an in-memory store, for tests.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // ── Event log ─────────────────────────────────────────────────────────

    /// Appends an event to the log. The log is append-only: no update or
    /// delete is exposed. The write is flushed before this returns.
    pub async fn append_event(&self, event: &AccessEvent) -> Result<()> {
        let student_id = event.student_id.as_str().to_owned();
        let direction = event.direction.as_str();
        let event_time = encode_ts(event.occurred_at);

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO events (student_id, direction, event_time) VALUES (?1, ?2, ?3)",
                    rusqlite::params![student_id, direction, event_time],
                )?;
                Ok(())
            })
            .await?;

        debug!(
            student_id = %event.student_id,
            direction = %event.direction,
            "event appended"
        );
        Ok(())
    }

    /// Events with `start <= event_time <= end`, in insertion order.
    /// Callers sort by `occurred_at` when they need chronology.
    pub async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AccessEvent>> {
        let start = encode_ts(start);
        let end = encode_ts(end);

        let raws: Vec<RawEventRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT student_id, direction, event_time FROM events
                     WHERE event_time BETWEEN ?1 AND ?2",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![start, end], |row| {
                        Ok(RawEventRow {
                            student_id: row.get(0)?,
                            direction: row.get(1)?,
                            event_time: row.get(2)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        raws.into_iter().map(RawEventRow::into_event).collect()
    }

    /// One student's events in a window, in insertion order.
    pub async fn events_for_student(
        &self,
        student_id: &StudentId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AccessEvent>> {
        let student_id = student_id.as_str().to_owned();
        let start = encode_ts(start);
        let end = encode_ts(end);

        let raws: Vec<RawEventRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT student_id, direction, event_time FROM events
                     WHERE student_id = ?1 AND event_time BETWEEN ?2 AND ?3",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![student_id, start, end], |row| {
                        Ok(RawEventRow {
                            student_id: row.get(0)?,
                            direction: row.get(1)?,
                            event_time: row.get(2)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        raws.into_iter().map(RawEventRow::into_event).collect()
    }

    // ── Student roster ────────────────────────────────────────────────────

    /// Adds or updates a roster entry.
    pub async fn upsert_student(&self, student: &Student) -> Result<()> {
        let student_id = student.student_id.as_str().to_owned();
        let name = student.name.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO students (student_id, name) VALUES (?1, ?2)
                     ON CONFLICT(student_id) DO UPDATE SET name = excluded.name",
                    rusqlite::params![student_id, name],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Looks up one roster entry.
    pub async fn student(&self, student_id: &StudentId) -> Result<Option<Student>> {
        let id = student_id.as_str().to_owned();

        let row: Option<(String, String)> = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT student_id, name FROM students WHERE student_id = ?1",
                        rusqlite::params![id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?)
            })
            .await?;

        Ok(row.map(|(id, name)| Student::new(id, name)))
    }

    /// The full roster.
    pub async fn students(&self) -> Result<Vec<Student>> {
        let rows: Vec<(String, String)> = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT student_id, name FROM students ORDER BY student_id")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Student::new(id, name))
            .collect())
    }

    // ── Subscriber directory ──────────────────────────────────────────────

    /// Inserts or fully replaces a subscriber row, preference flags included.
    pub async fn upsert_subscriber(&self, sub: &Subscriber) -> Result<()> {
        let sub = sub.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO subscribers
                     (chat_id, name, phone, student_id, language, entry_on, exit_on, late_on)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        sub.chat_id,
                        sub.name,
                        sub.phone,
                        sub.student_id.as_str(),
                        sub.language,
                        sub.prefs.entry_on as i64,
                        sub.prefs.exit_on as i64,
                        sub.prefs.late_on as i64,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Looks up a subscriber by chat ID.
    pub async fn subscriber(&self, chat_id: i64) -> Result<Option<Subscriber>> {
        let raw: Option<RawSubscriberRow> = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE chat_id = ?1"),
                        rusqlite::params![chat_id],
                        read_subscriber_row,
                    )
                    .optional()?)
            })
            .await?;

        Ok(raw.map(RawSubscriberRow::into_subscriber))
    }

    /// Subscribers linked to a student.
    ///
    /// Joined against the roster: a subscriber whose student is missing
    /// from the roster is unlinked and never returned here.
    pub async fn subscribers_for(&self, student_id: &StudentId) -> Result<Vec<Subscriber>> {
        let id = student_id.as_str().to_owned();

        let raws: Vec<RawSubscriberRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT s.chat_id, s.name, s.phone, s.student_id, s.language,
                            s.entry_on, s.exit_on, s.late_on
                     FROM subscribers s
                     JOIN students st ON st.student_id = s.student_id
                     WHERE s.student_id = ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], read_subscriber_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        Ok(raws
            .into_iter()
            .map(RawSubscriberRow::into_subscriber)
            .collect())
    }

    /// Updates one profile field. The field set is closed; an unknown field
    /// is unrepresentable.
    pub async fn set_profile_field(
        &self,
        chat_id: i64,
        field: ProfileField,
        value: &str,
    ) -> Result<()> {
        let value = value.to_owned();
        let column = field.column();

        let updated: usize = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    &format!("UPDATE subscribers SET {column} = ?1 WHERE chat_id = ?2"),
                    rusqlite::params![value, chat_id],
                )?;
                Ok(n)
            })
            .await?;

        if updated == 0 {
            return Err(StoreError::SubscriberNotFound(chat_id));
        }
        Ok(())
    }

    /// Flips one preference flag and returns its new value.
    pub async fn toggle_pref(&self, chat_id: i64, pref: PrefKind) -> Result<bool> {
        let column = pref.column();

        let new_value: Option<i64> = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    &format!("UPDATE subscribers SET {column} = 1 - {column} WHERE chat_id = ?1"),
                    rusqlite::params![chat_id],
                )?;
                if n == 0 {
                    return Ok(None);
                }
                let value: i64 = conn.query_row(
                    &format!("SELECT {column} FROM subscribers WHERE chat_id = ?1"),
                    rusqlite::params![chat_id],
                    |row| row.get(0),
                )?;
                Ok(Some(value))
            })
            .await?;

        new_value
            .map(|v| v != 0)
            .ok_or(StoreError::SubscriberNotFound(chat_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, h, m, s).unwrap()
    }

    async fn store_with_student() -> AttendanceStore {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        store
            .upsert_student(&Student::new("20201234", "Aziz Karimov"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_append_and_query_range() {
        let store = store_with_student().await;

        let inside = AccessEvent::new("20201234", Direction::Entry, at(8, 30, 0));
        let outside = AccessEvent::new("20201234", Direction::Exit, at(18, 0, 0));
        store.append_event(&inside).await.unwrap();
        store.append_event(&outside).await.unwrap();

        let events = store.events_between(at(8, 0, 0), at(9, 0, 0)).await.unwrap();
        assert_eq!(events, vec![inside]);
    }

    #[tokio::test]
    async fn test_query_returns_insertion_order() {
        let store = store_with_student().await;

        // Inserted out of chronological order on purpose.
        let later = AccessEvent::new("20201234", Direction::Exit, at(17, 0, 0));
        let earlier = AccessEvent::new("20201234", Direction::Entry, at(8, 0, 0));
        store.append_event(&later).await.unwrap();
        store.append_event(&earlier).await.unwrap();

        let events = store.events_between(at(0, 0, 0), at(23, 59, 59)).await.unwrap();
        assert_eq!(events, vec![later, earlier]);
    }

    #[tokio::test]
    async fn test_events_for_student_filters() {
        let store = store_with_student().await;

        store
            .append_event(&AccessEvent::new("20201234", Direction::Entry, at(8, 0, 0)))
            .await
            .unwrap();
        store
            .append_event(&AccessEvent::new("20209999", Direction::Entry, at(8, 5, 0)))
            .await
            .unwrap();

        let id = StudentId::from_string("20201234");
        let events = store
            .events_for_student(&id, at(0, 0, 0), at(23, 59, 59))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].student_id, id);
    }

    #[tokio::test]
    async fn test_subscriber_roundtrip() {
        let store = store_with_student().await;

        let mut sub = Subscriber::new(77, "Dilnoza", "+998901234567", "20201234", "uz");
        sub.prefs.entry_on = false;
        store.upsert_subscriber(&sub).await.unwrap();

        let loaded = store.subscriber(77).await.unwrap().unwrap();
        assert_eq!(loaded, sub);
    }

    #[tokio::test]
    async fn test_unlinked_subscriber_excluded() {
        let store = AttendanceStore::open_in_memory().await.unwrap();

        // Subscriber references a student the roster does not know.
        let sub = Subscriber::new(77, "Dilnoza", "+998", "20201234", "uz");
        store.upsert_subscriber(&sub).await.unwrap();

        let id = StudentId::from_string("20201234");
        assert!(store.subscribers_for(&id).await.unwrap().is_empty());

        // Linking the student makes the subscriber visible.
        store
            .upsert_student(&Student::new("20201234", "Aziz Karimov"))
            .await
            .unwrap();
        let subs = store.subscribers_for(&id).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].chat_id, 77);
    }

    #[tokio::test]
    async fn test_toggle_pref_flips_and_reports() {
        let store = store_with_student().await;
        let sub = Subscriber::new(77, "Dilnoza", "+998", "20201234", "uz");
        store.upsert_subscriber(&sub).await.unwrap();

        // Default is on; first toggle turns it off.
        assert!(!store.toggle_pref(77, PrefKind::Entry).await.unwrap());
        assert!(store.toggle_pref(77, PrefKind::Entry).await.unwrap());

        let loaded = store.subscriber(77).await.unwrap().unwrap();
        assert!(loaded.prefs.entry_on);
    }

    #[tokio::test]
    async fn test_toggle_pref_unknown_chat() {
        let store = AttendanceStore::open_in_memory().await.unwrap();
        let result = store.toggle_pref(12345, PrefKind::Exit).await;
        assert!(matches!(result, Err(StoreError::SubscriberNotFound(12345))));
    }

    #[tokio::test]
    async fn test_set_profile_field() {
        let store = store_with_student().await;
        let sub = Subscriber::new(77, "Dilnoza", "+998", "20201234", "uz");
        store.upsert_subscriber(&sub).await.unwrap();

        store
            .set_profile_field(77, ProfileField::Phone, "+998909999999")
            .await
            .unwrap();
        let loaded = store.subscriber(77).await.unwrap().unwrap();
        assert_eq!(loaded.phone, "+998909999999");

        let missing = store.set_profile_field(1, ProfileField::Name, "x").await;
        assert!(matches!(missing, Err(StoreError::SubscriberNotFound(1))));
    }

    #[tokio::test]
    async fn test_reopen_preserves_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.db");

        let event = AccessEvent::new("20201234", Direction::Entry, at(8, 30, 0));
        {
            let store = AttendanceStore::open(&path).await.unwrap();
            store.append_event(&event).await.unwrap();
        }

        let store = AttendanceStore::open(&path).await.unwrap();
        let events = store.events_between(at(0, 0, 0), at(23, 59, 59)).await.unwrap();
        assert_eq!(events, vec![event]);
    }
}
