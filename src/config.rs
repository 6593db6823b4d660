//! Runtime configuration
//!
//! Defaults cover a production deployment; an optional JSON file named by
//! `FUNDAMENTALS_SYNC_CONFIG` replaces them, and a handful of environment
//! variables override individual values on top of that.

use crate::error::{AppError, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const CONFIG_PATH_ENV: &str = "FUNDAMENTALS_SYNC_CONFIG";
pub const BASE_URL_ENV: &str = "FUNDAMENTALS_SYNC_BASE_URL";
pub const DB_PATH_ENV: &str = "FUNDAMENTALS_SYNC_DB_PATH";
pub const SCHEDULE_ENV: &str = "FUNDAMENTALS_SYNC_SCHEDULE";
pub const TIMEZONE_ENV: &str = "FUNDAMENTALS_SYNC_TIMEZONE";

/// Upstream data provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL; endpoint names are appended to it
    pub base_url: String,
    /// Market code sent with every request
    pub market: String,
    pub request_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.datasectors.com/api/stocks/v2/".to_string(),
            market: "id-id".to_string(),
            request_timeout_secs: 30,
            pool_max_idle_per_host: 10,
            pool_idle_timeout_secs: 90,
        }
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

/// Refresh run scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Cron expression: 5-field, 6/7-field with seconds, or `@daily`-style
    pub expression: String,
    /// IANA timezone the expression is evaluated in
    pub timezone: String,
    /// Minimum spacing between two instruments
    pub min_interval_ms: u64,
    /// Instruments refreshed more recently than this are skipped
    pub staleness_hours: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            expression: "0 1 * * *".to_string(),
            timezone: "Asia/Jakarta".to_string(),
            min_interval_ms: 2_000,
            staleness_hours: 20,
            shutdown_grace_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("fundamentals.db"),
            pool_size: 4,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
    /// Tick of the cached clock
    pub clock_granularity_ms: u64,
}

impl AppConfig {
    /// Load configuration from the optional JSON file and process environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                tracing::info!("Loading configuration from {}", path);
                let raw = std::fs::read_to_string(&path)?;
                Self::from_json(&raw)?
            }
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid configuration file: {}", e)))
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV) {
            self.source.base_url = url;
        }
        if let Some(path) = lookup(DB_PATH_ENV) {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Some(expr) = lookup(SCHEDULE_ENV) {
            self.schedule.expression = expr;
        }
        if let Some(tz) = lookup(TIMEZONE_ENV) {
            self.schedule.timezone = tz;
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&mut self) -> Result<()> {
        if !self.source.base_url.ends_with('/') {
            self.source.base_url.push('/');
        }
        Url::parse(&self.source.base_url)
            .map_err(|e| {
                AppError::Config(format!("Invalid base URL '{}': {}", self.source.base_url, e))
            })?;

        if self.source.market.is_empty() {
            return Err(AppError::Config("Market code must not be empty".to_string()));
        }
        if self.source.request_timeout_secs == 0 {
            return Err(AppError::Config("Request timeout must be positive".to_string()));
        }
        if self.storage.pool_size == 0 {
            return Err(AppError::Config("Pool size must be positive".to_string()));
        }
        self.timezone()?;

        if self.clock_granularity_ms == 0 {
            self.clock_granularity_ms = 500;
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.schedule.timezone.parse::<Tz>().map_err(|e| {
            AppError::Config(format!("Unknown timezone '{}': {}", self.schedule.timezone, e))
        })
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.schedule.min_interval_ms)
    }

    pub fn staleness_threshold(&self) -> chrono::Duration {
        chrono::Duration::hours(self.schedule.staleness_hours as i64)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.schedule.shutdown_grace_secs)
    }

    pub fn clock_granularity(&self) -> Duration {
        Duration::from_millis(self.clock_granularity_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_validate() {
        let mut config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.source.market, "id-id");
        assert_eq!(config.source.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.clock_granularity(), Duration::from_millis(500));
        assert_eq!(config.timezone().unwrap(), chrono_tz::Asia::Jakarta);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{ "schedule": { "expression": "30 2 * * *", "min_interval_ms": 250 } }"#,
        )
        .unwrap();
        assert_eq!(config.schedule.expression, "30 2 * * *");
        assert_eq!(config.min_interval(), Duration::from_millis(250));
        assert_eq!(config.schedule.timezone, "Asia/Jakarta");
        assert_eq!(config.source.request_timeout_secs, 30);
    }

    #[test]
    fn test_overrides_and_trailing_slash() {
        let env: HashMap<&str, &str> = [
            (BASE_URL_ENV, "http://127.0.0.1:9000/v2"),
            (DB_PATH_ENV, "/tmp/metrics.db"),
            (TIMEZONE_ENV, "UTC"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        config.validate().unwrap();

        assert_eq!(config.source.base_url, "http://127.0.0.1:9000/v2/");
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/metrics.db"));
        assert_eq!(config.timezone().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.source.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.schedule.timezone = "Mars/Olympus".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        assert!(AppConfig::from_json("{ not json").is_err());
    }
}
