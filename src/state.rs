//! Application state

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::monitoring::{ExceptionSink, TracingSink};
use crate::services::{RefreshService, RefreshSettings};
use crate::sources::HttpMetricsSource;
use std::sync::Arc;

/// Long-lived components shared by the scheduler and its runs
pub struct AppState {
    pub config: AppConfig,

    /// Cached clock, refreshed by the clock task
    pub clock: Arc<dyn Clock>,

    /// Metrics database
    pub store: Arc<SqliteStore>,

    /// Upstream provider client
    pub source: Arc<HttpMetricsSource>,

    pub sink: Arc<dyn ExceptionSink>,

    pub refresh: Arc<RefreshService>,
}

impl AppState {
    pub fn new(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_sink(config, clock, Arc::new(TracingSink))
    }

    pub fn with_sink(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn ExceptionSink>,
    ) -> Result<Self> {
        if let Some(parent) = config.storage.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Arc::new(SqliteStore::from_config(&config.storage, clock.clone())?);
        let source = Arc::new(HttpMetricsSource::new(&config.source)?);

        let refresh = Arc::new(RefreshService::new(
            source.clone(),
            store.clone(),
            sink.clone(),
            RefreshSettings::from_config(&config),
        ));

        tracing::info!(
            base_url = %config.source.base_url,
            market = %config.source.market,
            "Application state initialized"
        );

        Ok(Self {
            config,
            clock,
            store,
            source,
            sink,
            refresh,
        })
    }
}
