//! Configuration for syncing.

use std::time::Duration;

/// Configuration for the upload coordinator, scheduler and HTTP remote.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server URL, without a trailing slash.
    pub base_url: String,
    /// Quiet period after the last `sync()` before a cycle starts.
    pub debounce: Duration,
    /// Interval of the fallback timer that requests a sync on its own.
    pub period: Duration,
    /// Version conflicts tolerated in a row before a cycle gives up.
    pub max_conflict_retries: u32,
    /// Request timeout.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            debounce: Duration::from_secs(10),
            period: Duration::from_secs(10 * 60),
            max_conflict_retries: 8,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the debounce delay.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the fallback sync period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets the number of version conflicts tolerated in a row.
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce, Duration::from_secs(10));
        assert_eq!(config.period, Duration::from_secs(600));
        assert_eq!(config.max_conflict_retries, 8);
    }

    #[test]
    fn builder_and_trailing_slash() {
        let config = SyncConfig::new("https://api.example.com/")
            .with_debounce(Duration::from_millis(50))
            .with_max_conflict_retries(2);
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.max_conflict_retries, 2);
    }
}
