//! Client for the relayed upstream event feed.
//!
//! The feed is a plain JSON endpoint: `GET {feed_url}?since=<ISO8601>`
//! returning an array of `{student_id, direction, timestamp}` records.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use gatewatch_models::{AccessEvent, Direction, StudentId};

use crate::error::{FetchError, Result};
use crate::source::EventSource;

/// Default per-request timeout for the feed.
const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// One record from the feed body.
#[derive(Debug, Deserialize)]
struct RawFeedEntry {
    student_id: Option<String>,
    direction: Option<String>,
    timestamp: Option<String>,
}

impl RawFeedEntry {
    fn normalize(self) -> Option<AccessEvent> {
        let student_id = self.student_id.filter(|id| !id.is_empty())?;
        let direction = Direction::parse(&self.direction?)?;
        let raw_time = self.timestamp?;
        let occurred_at = DateTime::parse_from_rfc3339(&raw_time)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()?;
        Some(AccessEvent {
            student_id: StudentId::from_string(student_id),
            direction,
            occurred_at,
        })
    }
}

/// HTTP client for the upstream feed.
pub struct FeedClient {
    client: reqwest::Client,
    feed_url: String,
}

impl FeedClient {
    /// Builds a client for the given feed URL.
    pub fn new(feed_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            feed_url: feed_url.into(),
        })
    }

    /// Fetches events newer than `cursor` (all recent events when `None`).
    pub async fn fetch_since(&self, cursor: Option<DateTime<Utc>>) -> Result<Vec<AccessEvent>> {
        let mut request = self.client.get(&self.feed_url);
        if let Some(cursor) = cursor {
            request = request.query(&[("since", cursor.to_rfc3339_opts(SecondsFormat::Secs, true))]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let entries: Vec<RawFeedEntry> = response
            .json()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        let total = entries.len();
        let events: Vec<AccessEvent> = entries
            .into_iter()
            .filter_map(RawFeedEntry::normalize)
            .collect();
        if events.len() < total {
            debug!(dropped = total - events.len(), "dropped malformed feed records");
        }
        Ok(events)
    }
}

#[async_trait]
impl EventSource for FeedClient {
    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<AccessEvent>> {
        self.fetch_since(since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::Router;
    use chrono::TimeZone;
    use std::collections::HashMap;

    #[test]
    fn test_normalize_feed_entry() {
        let entry = RawFeedEntry {
            student_id: Some("20201234".into()),
            direction: Some("exit".into()),
            timestamp: Some("2024-09-02T17:45:00Z".into()),
        };
        let event = entry.normalize().unwrap();
        assert_eq!(event.direction, Direction::Exit);
        assert_eq!(
            event.occurred_at,
            Utc.with_ymd_and_hms(2024, 9, 2, 17, 45, 0).unwrap()
        );
    }

    #[test]
    fn test_normalize_drops_incomplete_entries() {
        let entry = RawFeedEntry {
            student_id: None,
            direction: Some("exit".into()),
            timestamp: Some("2024-09-02T17:45:00Z".into()),
        };
        assert!(entry.normalize().is_none());
    }

    async fn spawn_feed_fixture() -> String {
        async fn handler(Query(params): Query<HashMap<String, String>>) -> &'static str {
            // With a cursor the fixture pretends everything is consumed.
            if params.contains_key("since") {
                "[]"
            } else {
                r#"[
                    {"student_id": "20201234", "direction": "entry", "timestamp": "2024-09-02T08:15:00Z"},
                    {"student_id": "20201234", "direction": "bogus", "timestamp": "2024-09-02T08:16:00Z"}
                ]"#
            }
        }

        let app = Router::new().route("/events", get(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/events")
    }

    #[tokio::test]
    async fn test_fetch_since_none_returns_events() {
        let url = spawn_feed_fixture().await;
        let client = FeedClient::new(url).unwrap();

        let events = client.fetch_since(None).await.unwrap();
        // Malformed direction dropped.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].student_id.as_str(), "20201234");
    }

    #[tokio::test]
    async fn test_fetch_since_cursor_passed() {
        let url = spawn_feed_fixture().await;
        let client = FeedClient::new(url).unwrap();

        let cursor = Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap();
        let events = client.fetch_since(Some(cursor)).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_error() {
        let client = FeedClient::new("http://127.0.0.1:1/events").unwrap();
        let result = client.fetch_since(None).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
