//! Client for the gate device's ISAPI access-control log.
//!
//! The device exposes the same logical endpoint on two transports: plain
//! HTTP on its management port, and HTTPS on 443 with a self-signed
//! certificate. Both require digest authentication. The primary transport
//! is tried first with a short timeout; any failure falls through to the
//! secondary.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use diqwest::WithDigestAuth;
use serde::Deserialize;
use tracing::{debug, warn};

use gatewatch_models::{AccessEvent, Direction, StudentId};

use crate::error::{FetchError, Result};
use crate::source::EventSource;

/// Path of the access log endpoint, shared by both transports.
const LOG_PATH: &str = "/ISAPI/AccessControl/Log";

/// Connection settings for the gate device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device address (IP or hostname).
    pub host: String,
    /// Management port for the plaintext transport.
    pub http_port: u16,
    /// Port for the TLS fallback transport.
    pub https_port: u16,
    /// Digest-auth username.
    pub username: String,
    /// Digest-auth password.
    pub password: String,
    /// Per-request timeout, applied to both transports.
    pub timeout: Duration,
    /// Window size for the first fetch, when no watermark exists yet.
    pub lookback: Duration,
}

impl DeviceConfig {
    /// Creates a config with the standard ports and timeouts.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            http_port: 8000,
            https_port: 443,
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(5),
            lookback: Duration::from_secs(300),
        }
    }

    /// Sets the management port.
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Sets the TLS fallback port.
    pub fn with_https_port(mut self, port: u16) -> Self {
        self.https_port = port;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the first-fetch lookback window.
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }
}

/// One record from the device's JSON log body.
#[derive(Debug, Deserialize)]
struct RawLogEntry {
    #[serde(rename = "eventTime")]
    event_time: Option<String>,
    #[serde(rename = "personId")]
    person_id: Option<String>,
    #[serde(rename = "entryStatus")]
    entry_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogResponse {
    #[serde(default)]
    data: Vec<RawLogEntry>,
}

impl RawLogEntry {
    /// Normalizes a raw record into an [`AccessEvent`].
    ///
    /// Records missing a required field, or carrying a timestamp or status
    /// label the parser does not recognize, are dropped here — the caller
    /// must not assume a 1:1 count with the upstream payload.
    fn normalize(self) -> Option<AccessEvent> {
        let person_id = self.person_id.filter(|id| !id.is_empty())?;
        let status = self.entry_status?;
        let direction = match Direction::parse(&status) {
            Some(d) => d,
            None => {
                debug!(status = %status, "dropping record with unknown entry status");
                return None;
            }
        };
        let raw_time = self.event_time?;
        let occurred_at = match parse_device_time(&raw_time) {
            Some(t) => t,
            None => {
                debug!(raw = %raw_time, "dropping record with unparseable event time");
                return None;
            }
        };
        Some(AccessEvent {
            student_id: StudentId::from_string(person_id),
            direction,
            occurred_at,
        })
    }
}

/// Devices report either full RFC 3339 or a bare local-style
/// `YYYY-MM-DDTHH:MM:SS`; the bare form is taken as UTC.
fn parse_device_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Formats a window bound the way the ISAPI endpoint expects.
fn format_window_bound(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Digest-authenticated client for the device log, with transport fallback.
pub struct DeviceClient {
    config: DeviceConfig,
    /// Client for the plaintext management port.
    http: reqwest::Client,
    /// Client for the TLS port. The device ships a self-signed certificate,
    /// so validation is disabled on this client only.
    https: reqwest::Client,
    primary_base: String,
    fallback_base: String,
}

impl DeviceClient {
    /// Builds a client for the given device.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let primary_base = format!("http://{}:{}", config.host, config.http_port);
        let fallback_base = format!("https://{}:{}", config.host, config.https_port);
        Self::with_bases(config, primary_base, fallback_base)
    }

    /// Builds a client with explicit base URLs (tests point these at local
    /// fixtures).
    pub(crate) fn with_bases(
        config: DeviceConfig,
        primary_base: String,
        fallback_base: String,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        let https = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            config,
            http,
            https,
            primary_base,
            fallback_base,
        })
    }

    /// Fetches access events in `[window_start, window_end]`.
    ///
    /// Tries the primary transport, then the fallback. An empty `Ok` means
    /// the device answered and had nothing new; `Err(Unavailable)` means
    /// neither transport could be reached.
    pub async fn fetch_access_events(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<AccessEvent>> {
        let query = format!(
            "{LOG_PATH}?format=json&startTime={}&endTime={}",
            format_window_bound(window_start),
            format_window_bound(window_end),
        );

        let primary_url = format!("{}{}", self.primary_base, query);
        let primary_err = match self.fetch_from(&self.http, &primary_url).await {
            Ok(events) => return Ok(events),
            Err(e) => {
                warn!(url = %primary_url, error = %e, "primary transport failed; trying fallback");
                e
            }
        };

        let fallback_url = format!("{}{}", self.fallback_base, query);
        match self.fetch_from(&self.https, &fallback_url).await {
            Ok(events) => Ok(events),
            Err(fallback_err) => {
                warn!(url = %fallback_url, error = %fallback_err, "fallback transport failed");
                Err(FetchError::Unavailable {
                    primary: primary_err.to_string(),
                    fallback: fallback_err.to_string(),
                })
            }
        }
    }

    async fn fetch_from(&self, client: &reqwest::Client, url: &str) -> Result<Vec<AccessEvent>> {
        let response = client
            .get(url)
            .send_with_digest_auth(&self.config.username, &self.config.password)
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: LogResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        let total = body.data.len();
        let events: Vec<AccessEvent> = body
            .data
            .into_iter()
            .filter_map(RawLogEntry::normalize)
            .collect();
        if events.len() < total {
            debug!(
                dropped = total - events.len(),
                "dropped malformed device records"
            );
        }
        Ok(events)
    }
}

#[async_trait]
impl EventSource for DeviceClient {
    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<AccessEvent>> {
        let now = Utc::now();
        let lookback = chrono::Duration::from_std(self.config.lookback)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        let window_start = since.unwrap_or(now - lookback);
        self.fetch_access_events(window_start, now).await
    }
}
