//! Refresh Service
//!
//! One run walks the stale instruments strictly in order. For each one it
//! fetches both upstream payloads, normalizes them, merges the overview
//! record and persists the result. Consecutive instruments are spaced by at
//! least the configured interval; the spacing wait is cancelable.
//!
//! Failures are isolated per instrument: they are logged, forwarded to the
//! exception sink and the run moves on.

use crate::config::AppConfig;
use crate::db::models::{OverviewMetricsRecord, TrackedInstrument};
use crate::db::MetricsStore;
use crate::error::AppError;
use crate::monitoring::{Context, ExceptionSink, Tags};
use crate::normalize::{merge_equities, EarningsResponse, EquitiesResponse};
use crate::sources::MetricsSource;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MODULE: &str = "ingest";
const JOB: &str = "refresh_fundamentals";

/// Observable position of the service within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Fetching,
    Normalizing,
    Merging,
    Persisting,
    Waiting,
    Completed,
    Canceled,
}

/// Pipeline step a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectInstruments,
    FetchEarnings,
    DecodeEarnings,
    ParseQuarterlyHistory,
    ParseOverviewFromEarnings,
    FetchEquities,
    DecodeEquities,
    MergeOverviewFromEquities,
    UpsertQuarterlyHistory,
    UpsertOverviewMetrics,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SelectInstruments => "select_instruments",
            Stage::FetchEarnings => "fetch_earnings",
            Stage::DecodeEarnings => "decode_earnings",
            Stage::ParseQuarterlyHistory => "parse_quarterly_history",
            Stage::ParseOverviewFromEarnings => "parse_overview_from_earnings",
            Stage::FetchEquities => "fetch_equities",
            Stage::DecodeEquities => "decode_equities",
            Stage::MergeOverviewFromEquities => "merge_overview_from_equities",
            Stage::UpsertQuarterlyHistory => "upsert_quarterly_history",
            Stage::UpsertOverviewMetrics => "upsert_overview_metrics",
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub canceled: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstrumentOutcome {
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Minimum spacing between the start of consecutive instruments
    pub min_interval: Duration,
    pub staleness: chrono::Duration,
}

impl RefreshSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_interval: config.min_interval(),
            staleness: config.staleness_threshold(),
        }
    }
}

/// Rate-limited batch processor
pub struct RefreshService {
    source: Arc<dyn MetricsSource>,
    store: Arc<dyn MetricsStore>,
    sink: Arc<dyn ExceptionSink>,
    settings: RefreshSettings,
    state: watch::Sender<RunState>,
}

impl RefreshService {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        store: Arc<dyn MetricsStore>,
        sink: Arc<dyn ExceptionSink>,
        settings: RefreshSettings,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            source,
            store,
            sink,
            settings,
            state,
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: RunState) {
        self.state.send_replace(state);
    }

    /// Refresh every stale instrument once
    pub async fn run_once(&self, cancel: &CancellationToken) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        self.set_state(RunState::Running);
        info!(job = JOB, "Refresh run started");

        let instruments = match self.store.select_stale_instruments(self.settings.staleness).await {
            Ok(instruments) => instruments,
            Err(err) => {
                error!(job = JOB, error = %err, "Failed to select instruments");
                self.report(&err, Stage::SelectInstruments, None, Context::new());
                return self.finish(summary, started);
            }
        };

        if instruments.is_empty() {
            warn!(job = JOB, "No instruments due for refresh");
            return self.finish(summary, started);
        }

        let total = instruments.len();
        for (index, instrument) in instruments.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(job = JOB, "Refresh run canceled");
                summary.canceled = true;
                break;
            }

            let instrument_started = Instant::now();
            summary.attempted += 1;

            match self.process_instrument(instrument, cancel).await {
                InstrumentOutcome::Succeeded => summary.succeeded += 1,
                InstrumentOutcome::Failed => summary.failed += 1,
                InstrumentOutcome::Canceled => {
                    summary.canceled = true;
                    break;
                }
            }

            if index + 1 == total {
                break;
            }

            let remaining = self
                .settings
                .min_interval
                .saturating_sub(instrument_started.elapsed());
            if remaining.is_zero() {
                continue;
            }

            self.set_state(RunState::Waiting);
            debug!(
                job = JOB,
                wait_ms = remaining.as_millis() as u64,
                "Waiting before next instrument"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(job = JOB, "Refresh run canceled while waiting");
                    summary.canceled = true;
                    break;
                }
                _ = tokio::time::sleep(remaining) => {}
            }
        }

        self.finish(summary, started)
    }

    fn finish(&self, mut summary: RunSummary, started: Instant) -> RunSummary {
        summary.elapsed = started.elapsed();
        self.set_state(if summary.canceled {
            RunState::Canceled
        } else {
            RunState::Completed
        });
        info!(
            job = JOB,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            canceled = summary.canceled,
            duration_ms = summary.elapsed.as_millis() as u64,
            "Refresh run finished"
        );
        summary
    }

    async fn process_instrument(
        &self,
        instrument: &TrackedInstrument,
        cancel: &CancellationToken,
    ) -> InstrumentOutcome {
        let ticker = instrument.symbol.as_str();
        let mut failed = false;

        self.set_state(RunState::Fetching);
        let pair = self.source.fetch(instrument, cancel).await;
        if cancel.is_cancelled() {
            info!(job = JOB, ticker, "Run canceled during fetch; instrument skipped");
            return InstrumentOutcome::Canceled;
        }

        self.set_state(RunState::Normalizing);

        let mut history = Vec::new();
        let mut seed = None;
        match pair.earnings.and_then(|raw| EarningsResponse::decode(&raw.body)) {
            Err(err) => {
                let stage = stage_for(&err, Stage::FetchEarnings, Stage::DecodeEarnings);
                if err.is_transport() {
                    warn!(
                        job = JOB,
                        ticker,
                        error = %err,
                        "Failed to fetch earnings; continuing with equities"
                    );
                } else {
                    error!(job = JOB, ticker, error = %err, "Failed to decode earnings");
                }
                self.report(&err, stage, Some(ticker), Context::new());
                failed = true;
            }
            Ok(earnings) => {
                match earnings.to_quarterly_history(ticker) {
                    Ok(records) => history = records,
                    Err(err) => {
                        error!(
                            job = JOB,
                            ticker,
                            error = %err,
                            "Failed to parse quarterly history"
                        );
                        self.report(
                            &err,
                            Stage::ParseQuarterlyHistory,
                            Some(ticker),
                            Context::new(),
                        );
                        failed = true;
                    }
                }
                match earnings.to_overview_seed(ticker) {
                    Ok(record) => seed = Some(record),
                    Err(err) => {
                        error!(
                            job = JOB,
                            ticker,
                            error = %err,
                            "Failed to parse overview metrics from earnings"
                        );
                        self.report(
                            &err,
                            Stage::ParseOverviewFromEarnings,
                            Some(ticker),
                            Context::new(),
                        );
                        failed = true;
                    }
                }
            }
        }

        let from_earnings = seed.is_some();
        let mut overview = seed.unwrap_or_else(|| OverviewMetricsRecord::for_symbol(ticker));

        match pair.equities.and_then(|raw| EquitiesResponse::decode(&raw.body)) {
            Err(err) => {
                let stage = stage_for(&err, Stage::FetchEquities, Stage::DecodeEquities);
                error!(job = JOB, ticker, error = %err, "Failed to load equities");
                self.report(&err, stage, Some(ticker), Context::new());
                failed = true;
            }
            Ok(equities) => {
                self.set_state(RunState::Merging);
                if let Err(err) = merge_equities(&mut overview, &equities) {
                    error!(
                        job = JOB,
                        ticker,
                        error = %err,
                        "Failed to merge overview metrics from equities"
                    );
                    self.report(
                        &err,
                        Stage::MergeOverviewFromEquities,
                        Some(ticker),
                        Context::new(),
                    );
                    failed = true;
                }
            }
        }

        self.set_state(RunState::Persisting);

        if history.is_empty() {
            debug!(job = JOB, ticker, "No quarterly history to upsert");
        } else {
            match self.store.upsert_quarterly_history(&history).await {
                Ok(()) => info!(
                    job = JOB,
                    ticker,
                    quarterly_record_count = history.len(),
                    "Quarterly history upserted"
                ),
                Err(err) => {
                    error!(job = JOB, ticker, error = %err, "Failed to upsert quarterly history");
                    let mut context = Context::new();
                    context.insert("record_count".to_string(), Value::from(history.len()));
                    self.report(&err, Stage::UpsertQuarterlyHistory, Some(ticker), context);
                    failed = true;
                }
            }
        }

        match self.store.upsert_overview_metrics(Some(&overview)).await {
            Ok(()) => info!(
                job = JOB,
                ticker,
                symbol = %overview.symbol,
                overview_from_earnings = from_earnings,
                "Overview metrics upserted"
            ),
            Err(err) => {
                error!(job = JOB, ticker, error = %err, "Failed to upsert overview metrics");
                self.report(&err, Stage::UpsertOverviewMetrics, Some(ticker), Context::new());
                failed = true;
            }
        }

        if failed {
            InstrumentOutcome::Failed
        } else {
            InstrumentOutcome::Succeeded
        }
    }

    fn report(&self, err: &AppError, stage: Stage, ticker: Option<&str>, mut context: Context) {
        let mut tags = Tags::new();
        tags.insert("module".to_string(), MODULE.to_string());
        tags.insert("job".to_string(), JOB.to_string());
        tags.insert("action".to_string(), stage.as_str().to_string());
        tags.insert("error_code".to_string(), err.code().to_string());

        if let Some(ticker) = ticker {
            context.insert("ticker".to_string(), Value::from(ticker));
        }
        self.sink.capture(err, &tags, &context);
    }
}

// Decode failures are attributed to the decode step, everything else to the fetch
fn stage_for(err: &AppError, fetch: Stage, decode: Stage) -> Stage {
    match err {
        AppError::Decode(_) => decode,
        _ => fetch,
    }
}
