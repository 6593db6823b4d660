//! Refresh scheduler
//!
//! Runs the refresh once at startup and then on the configured daily
//! schedule. Runs never overlap: the loop awaits each run before computing
//! the next fire time.

use super::schedule::Schedule;
use crate::clock::Clock;
use crate::error::Result;
use crate::services::RefreshService;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};
use uuid::Uuid;

const JOB: &str = "refresh_fundamentals";

pub struct RefreshScheduler {
    service: Arc<RefreshService>,
    clock: Arc<dyn Clock>,
    expression: String,
    timezone: Tz,
}

impl RefreshScheduler {
    pub fn new(
        service: Arc<RefreshService>,
        clock: Arc<dyn Clock>,
        expression: &str,
        timezone: Tz,
    ) -> Self {
        Self {
            service,
            clock,
            expression: expression.to_string(),
            timezone,
        }
    }

    /// Register the schedule and spawn the scheduler loop
    ///
    /// An invalid expression is returned as an error and nothing is spawned.
    /// The handle completes once `cancel` fires and any in-flight run has
    /// observed it.
    pub fn start(self, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        let schedule = Schedule::parse(&self.expression, self.timezone)?;
        info!(job = JOB, schedule = %schedule, "Refresh job registered");
        Ok(tokio::spawn(self.run(schedule, cancel)))
    }

    async fn run(self, schedule: Schedule, cancel: CancellationToken) {
        info!("Refresh scheduler started");
        self.execute(&cancel).await;

        let mut last_fire: Option<DateTime<Utc>> = None;
        while !cancel.is_cancelled() {
            // The cached clock may lag the timer slightly; never fire the same slot twice
            let now = self.clock.now();
            let reference = last_fire.map_or(now, |fired| fired.max(now));

            let Some(next) = schedule.next_after(reference) else {
                error!(
                    job = JOB,
                    schedule = %schedule,
                    "No upcoming fire time; scheduler stopping"
                );
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(
                job = JOB,
                next_run = %next.with_timezone(&schedule.timezone()),
                "Next refresh in {} hours {} minutes",
                wait.as_secs() / 3600,
                (wait.as_secs() % 3600) / 60
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            last_fire = Some(next);
            self.execute(&cancel).await;
        }

        info!("Refresh scheduler stopped");
    }

    async fn execute(&self, cancel: &CancellationToken) {
        let run_id = Uuid::new_v4();
        let run_cancel = cancel.child_token();
        self.service
            .run_once(&run_cancel)
            .instrument(tracing::info_span!("refresh_run", %run_id))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::models::{OverviewMetricsRecord, QuarterlyHistoryRecord, TrackedInstrument};
    use crate::db::MetricsStore;
    use crate::error::AppError;
    use crate::monitoring::RecordingSink;
    use crate::services::RefreshSettings;
    use crate::sources::{MetricsSource, RawSourceResponse, SourceKind};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct UnusedSource;

    #[async_trait]
    impl MetricsSource for UnusedSource {
        async fn fetch_one(
            &self,
            _kind: SourceKind,
            _instrument: &TrackedInstrument,
            _cancel: &CancellationToken,
        ) -> Result<RawSourceResponse> {
            Err(AppError::Internal("unexpected fetch".to_string()))
        }
    }

    /// Store with nothing to refresh; counts how often a run started
    #[derive(Default)]
    struct CountingStore {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl MetricsStore for CountingStore {
        async fn select_stale_instruments(
            &self,
            _threshold: chrono::Duration,
        ) -> Result<Vec<TrackedInstrument>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn upsert_quarterly_history(
            &self,
            _records: &[QuarterlyHistoryRecord],
        ) -> Result<()> {
            Ok(())
        }

        async fn upsert_overview_metrics(
            &self,
            _record: Option<&OverviewMetricsRecord>,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn scheduler(expression: &str, now: DateTime<Utc>) -> (RefreshScheduler, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::default());
        let service = Arc::new(RefreshService::new(
            Arc::new(UnusedSource),
            store.clone(),
            Arc::new(RecordingSink::new()),
            RefreshSettings {
                min_interval: Duration::ZERO,
                staleness: chrono::Duration::hours(20),
            },
        ));
        let clock = Arc::new(FixedClock::new(now));
        let scheduler = RefreshScheduler::new(service, clock, expression, chrono_tz::UTC);
        (scheduler, store)
    }

    #[tokio::test]
    async fn test_invalid_expression_is_fatal() {
        let (scheduler, store) = scheduler("0 25 * * *", Utc::now());
        let result = scheduler.start(CancellationToken::new());
        assert!(matches!(result, Err(AppError::Schedule(_))));
        assert_eq!(store.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_on_schedule() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 59, 0).unwrap();
        let (scheduler, store) = scheduler("0 1 * * *", now);
        let cancel = CancellationToken::new();

        let handle = scheduler.start(cancel.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.runs.load(Ordering::SeqCst), 2);

        // The clock has not moved; the next slot is tomorrow
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(store.runs.load(Ordering::SeqCst), 2);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_scheduler() {
        let (scheduler, store) = scheduler("* * * * *", Utc::now());
        let cancel = CancellationToken::new();

        let handle = scheduler.start(cancel.clone()).unwrap();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(store.runs.load(Ordering::SeqCst) <= 1);
    }
}
