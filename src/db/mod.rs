//! Persistence layer
//!
//! The refresh pipeline only talks to `MetricsStore`; `sqlite::SqliteStore`
//! is the production implementation.

pub mod models;
pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use async_trait::async_trait;
use models::{OverviewMetricsRecord, QuarterlyHistoryRecord, TrackedInstrument};

#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Instruments with a credential that were never refreshed, or not
    /// within `threshold`
    async fn select_stale_instruments(
        &self,
        threshold: chrono::Duration,
    ) -> Result<Vec<TrackedInstrument>>;

    /// Upsert every record by (symbol, period_code) and touch each owner's
    /// freshness marker, all in one transaction. Empty input is a no-op.
    async fn upsert_quarterly_history(&self, records: &[QuarterlyHistoryRecord]) -> Result<()>;

    /// Upsert the record by symbol and touch its freshness marker in one
    /// transaction. `None` is a no-op.
    async fn upsert_overview_metrics(&self, record: Option<&OverviewMetricsRecord>) -> Result<()>;
}
