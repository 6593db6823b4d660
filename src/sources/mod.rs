//! Upstream metrics sources
//!
//! Every instrument is fetched from two endpoints at once. The two calls
//! share nothing but the HTTP client: each has its own timeout and its own
//! outcome, so one failing never hides the other's result.

pub mod http;

pub use http::HttpMetricsSource;

use crate::db::models::TrackedInstrument;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Upstream endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Earnings,
    Equities,
}

impl SourceKind {
    /// Path segment appended to the base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            SourceKind::Earnings => "earnings",
            SourceKind::Equities => "equities",
        }
    }
}

/// Raw upstream reply
#[derive(Debug, Clone)]
pub struct RawSourceResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// First value of each response header
    pub headers: HashMap<String, String>,
    /// Top-level `success` flag, when the body is a JSON object
    pub success: Option<bool>,
}

impl RawSourceResponse {
    pub fn new(status: u16, body: Vec<u8>, headers: HashMap<String, String>) -> Self {
        let success = sniff_success(&body);
        Self {
            status,
            body,
            headers,
            success,
        }
    }
}

fn sniff_success(body: &[u8]) -> Option<bool> {
    serde_json::from_slice::<Map<String, Value>>(body)
        .ok()
        .map(|envelope| envelope.get("success").and_then(Value::as_bool).unwrap_or(false))
}

/// Outcomes of both calls for one instrument
#[derive(Debug)]
pub struct SourcePair {
    pub earnings: Result<RawSourceResponse>,
    pub equities: Result<RawSourceResponse>,
}

/// Provider of raw upstream payloads
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch a single endpoint for an instrument
    async fn fetch_one(
        &self,
        kind: SourceKind,
        instrument: &TrackedInstrument,
        cancel: &CancellationToken,
    ) -> Result<RawSourceResponse>;

    /// Fetch both endpoints concurrently and return both outcomes
    async fn fetch(
        &self,
        instrument: &TrackedInstrument,
        cancel: &CancellationToken,
    ) -> SourcePair {
        let (earnings, equities) = tokio::join!(
            self.fetch_one(SourceKind::Earnings, instrument, cancel),
            self.fetch_one(SourceKind::Equities, instrument, cancel),
        );
        SourcePair { earnings, equities }
    }
}
