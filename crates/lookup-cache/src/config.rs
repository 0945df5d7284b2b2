//! Cache configuration options

use std::time::Duration;

/// Configuration for the lookup cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the primary store
    pub max_size: usize,
    /// Quiet period before a burst of mutations is turned into one invalidation pass
    pub debounce_delay: Duration,
    /// Period between background liveness sweeps
    pub sweep_interval: Duration,
    /// Whether the background sweeper runs
    pub auto_sweep: bool,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            debounce_delay: Duration::from_millis(16),
            sweep_interval: Duration::from_secs(30),
            auto_sweep: true,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with custom settings
    pub fn new(max_size: usize, debounce_delay_ms: u64, sweep_interval_ms: u64) -> Self {
        Self {
            max_size,
            debounce_delay: Duration::from_millis(debounce_delay_ms),
            sweep_interval: Duration::from_millis(sweep_interval_ms),
            ..Default::default()
        }
    }

    /// Create a disabled cache configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the maximum number of entries
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the debounce delay
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Set the sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enable or disable the background sweeper
    pub fn with_auto_sweep(mut self, auto_sweep: bool) -> Self {
        self.auto_sweep = auto_sweep;
        self
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Store capacity, never below one
    pub(crate) fn capacity(&self) -> usize {
        self.max_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.debounce_delay, Duration::from_millis(16));
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert!(config.auto_sweep);
        assert!(config.enabled);
    }

    #[test]
    fn test_disabled_config() {
        let config = CacheConfig::disabled();
        assert!(!config.enabled);
    }

    #[test]
    fn test_builder_pattern() {
        let config = CacheConfig::default()
            .with_max_size(50)
            .with_debounce_delay(Duration::from_millis(4))
            .with_sweep_interval(Duration::from_secs(5))
            .with_auto_sweep(false);

        assert_eq!(config.max_size, 50);
        assert_eq!(config.debounce_delay, Duration::from_millis(4));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert!(!config.auto_sweep);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(CacheConfig::default().with_max_size(0).capacity(), 1);
        assert_eq!(CacheConfig::new(10, 1, 1000).capacity(), 10);
    }
}
