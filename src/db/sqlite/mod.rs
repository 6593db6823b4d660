//! SQLite persistence gateway

mod instruments;
mod migrations;
mod overview_metrics;
mod quarterly_history;

use super::models::{OverviewMetricsRecord, QuarterlyHistoryRecord, TrackedInstrument};
use super::MetricsStore;
use crate::clock::Clock;
use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::Arc;

/// Pooled SQLite store; every call runs on the blocking thread pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply migrations
    pub fn open(path: &Path, pool_size: u32, clock: Arc<dyn Clock>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;",
            )
        });
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        {
            let conn = pool.get()?;
            migrations::run_migrations(&conn)?;
        }

        tracing::info!("Opened metrics database at {}", path.display());
        Ok(Self { pool, clock })
    }

    pub fn from_config(config: &StorageConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::open(&config.db_path, config.pool_size, clock)
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Database task failed: {}", e)))?
    }

    fn now(&self) -> String {
        format_time(&self.clock.now())
    }

    // ========== Instrument Methods ==========

    /// Track an instrument, replacing its credential if already tracked
    pub async fn register_instrument(&self, symbol: &str, api_key: &str) -> Result<()> {
        let symbol = symbol.to_string();
        let api_key = api_key.to_string();
        self.with_conn(move |conn| instruments::register_instrument(conn, &symbol, &api_key))
            .await
    }

    pub async fn get_last_refreshed(&self, symbol: &str) -> Result<Option<DateTime<Utc>>> {
        let symbol = symbol.to_string();
        self.with_conn(move |conn| instruments::get_last_refreshed(conn, &symbol))
            .await
    }

    // ========== Metrics Read-back ==========

    pub async fn get_overview_metrics(
        &self,
        symbol: &str,
    ) -> Result<Option<OverviewMetricsRecord>> {
        let symbol = symbol.to_string();
        self.with_conn(move |conn| overview_metrics::get_overview_metrics(conn, &symbol))
            .await
    }

    pub async fn get_quarterly_history(&self, symbol: &str) -> Result<Vec<QuarterlyHistoryRecord>> {
        let symbol = symbol.to_string();
        self.with_conn(move |conn| quarterly_history::get_quarterly_history(conn, &symbol))
            .await
    }
}

#[async_trait]
impl MetricsStore for SqliteStore {
    async fn select_stale_instruments(
        &self,
        threshold: chrono::Duration,
    ) -> Result<Vec<TrackedInstrument>> {
        let cutoff = self.clock.now() - threshold;
        self.with_conn(move |conn| instruments::select_stale(conn, &cutoff))
            .await
    }

    async fn upsert_quarterly_history(&self, records: &[QuarterlyHistoryRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let records = records.to_vec();
        let now = self.now();
        self.with_conn(move |conn| {
            quarterly_history::upsert_quarterly_history(conn, &records, &now)
        })
            .await
    }

    async fn upsert_overview_metrics(&self, record: Option<&OverviewMetricsRecord>) -> Result<()> {
        let Some(record) = record else {
            return Ok(());
        };
        let record = record.clone();
        let now = self.now();
        self.with_conn(move |conn| overview_metrics::upsert_overview_metrics(conn, &record, &now))
            .await
    }
}

/// Fixed-width RFC3339 so stored timestamps compare lexicographically
pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn format_opt_time(time: &Option<DateTime<Utc>>) -> Option<String> {
    time.as_ref().map(format_time)
}

pub(crate) fn read_time(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|time| Some(time.with_timezone(&Utc)))
        .map_err(|e| {
            let index = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
        })
}
