//! Bot configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use gatewatch_device::DeviceConfig;

use crate::error::{Result, TelegramError};

/// Which event source the pipeline polls.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// Relayed upstream feed.
    Feed { url: String },
    /// Direct device connection.
    Device(DeviceConfig),
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token.
    pub token: String,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Poll interval for the pipeline.
    pub poll_interval: Duration,
    /// Admin access codes; empty disables the admin console.
    pub admin_codes: Vec<String>,
    /// Event source selection. A configured feed URL wins over the device.
    pub source: SourceConfig,
}

impl BotConfig {
    /// Reads the configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").map_err(|_| TelegramError::NoToken)?;

        let db_path = std::env::var("GATEWATCH_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("attendance.db"));

        let poll_interval =
            Duration::from_secs(env_u64("GATEWATCH_POLL_INTERVAL_SECS")?.unwrap_or(5));

        let admin_codes = std::env::var("GATEWATCH_ADMIN_CODES")
            .map(|raw| parse_admin_codes(&raw))
            .unwrap_or_default();

        let source = if let Ok(url) = std::env::var("GATEWATCH_FEED_URL") {
            SourceConfig::Feed { url }
        } else {
            let host = std::env::var("DEVICE_HOST").map_err(|_| {
                TelegramError::Configuration(
                    "set GATEWATCH_FEED_URL or DEVICE_HOST to choose an event source".into(),
                )
            })?;
            let username = std::env::var("DEVICE_USER").map_err(|_| {
                TelegramError::Configuration("DEVICE_USER not set".into())
            })?;
            let password = std::env::var("DEVICE_PASSWORD").map_err(|_| {
                TelegramError::Configuration("DEVICE_PASSWORD not set".into())
            })?;

            let mut device = DeviceConfig::new(host, username, password);
            if let Some(port) = env_u64("DEVICE_HTTP_PORT")? {
                device = device.with_http_port(port as u16);
            }
            if let Some(port) = env_u64("DEVICE_HTTPS_PORT")? {
                device = device.with_https_port(port as u16);
            }
            if let Some(secs) = env_u64("DEVICE_LOOKBACK_SECS")? {
                device = device.with_lookback(Duration::from_secs(secs));
            }
            SourceConfig::Device(device)
        };

        Ok(Self {
            token,
            db_path,
            poll_interval,
            admin_codes,
            source,
        })
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| TelegramError::Configuration(format!("{name} must be a number: {raw}"))),
        Err(_) => Ok(None),
    }
}

/// Splits a comma-separated code list, dropping blanks.
pub fn parse_admin_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_codes() {
        assert_eq!(parse_admin_codes("alpha, beta ,gamma"), vec!["alpha", "beta", "gamma"]);
        assert_eq!(parse_admin_codes(""), Vec::<String>::new());
        assert_eq!(parse_admin_codes(" , ,"), Vec::<String>::new());
    }
}
