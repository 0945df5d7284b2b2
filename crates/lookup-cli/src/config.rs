use anyhow::Result;
use lookup_cache::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_size: usize,
    pub debounce_delay_ms: u64,
    pub sweep_interval_ms: u64,
    pub auto_sweep: bool,
    pub enabled: bool,
    pub show_timing: bool,
    pub max_rows: usize,
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Table,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            max_size: cache.max_size,
            debounce_delay_ms: cache.debounce_delay.as_millis() as u64,
            sweep_interval_ms: cache.sweep_interval.as_millis() as u64,
            auto_sweep: cache.auto_sweep,
            enabled: cache.enabled,
            show_timing: true,
            max_rows: 50,
            output_format: OutputFormat::Table,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .with_max_size(self.max_size)
            .with_debounce_delay(Duration::from_millis(self.debounce_delay_ms))
            .with_sweep_interval(Duration::from_millis(self.sweep_interval_ms))
            .with_auto_sweep(self.auto_sweep)
            .with_enabled(self.enabled)
    }

    /// `--output` on the command line wins over the file
    pub fn with_output(mut self, output: Option<OutputFormat>) -> Self {
        if let Some(output) = output {
            self.output_format = output;
        }
        self
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format '{}'", other)),
        }
    }
}
