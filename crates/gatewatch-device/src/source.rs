//! The seam between the poller and whatever produces events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gatewatch_models::AccessEvent;

use crate::error::Result;

/// A pollable source of access events.
///
/// `since` is the caller's watermark: the highest timestamp it has already
/// processed, or `None` on the first cycle. Sources may return events at or
/// before `since`; the poller deduplicates. An `Err` means the source was
/// unreachable this cycle — the caller keeps its watermark and retries.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<AccessEvent>>;
}
