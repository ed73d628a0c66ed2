//! Pipeline configuration.

use std::time::Duration;

/// Configuration for the polling pipeline.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// How often to poll the event source.
    pub poll_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl PollerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PollerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = PollerConfig::new().with_poll_interval(Duration::from_millis(100));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }
}
