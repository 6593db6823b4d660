//! Exception reporting
//!
//! Every handled pipeline failure is forwarded to an `ExceptionSink` with a
//! tag set (module, job, action, error code) and a free-form context map.

use crate::error::{AppError, ErrorResponse};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;
pub type Context = Map<String, Value>;

/// Receiver of handled failures
pub trait ExceptionSink: Send + Sync {
    fn capture(&self, error: &AppError, tags: &Tags, context: &Context);
}

/// Sink that emits one structured `tracing` event per failure
#[derive(Debug, Default)]
pub struct TracingSink;

impl ExceptionSink for TracingSink {
    fn capture(&self, error: &AppError, tags: &Tags, context: &Context) {
        let context = Value::Object(context.clone());
        tracing::error!(
            error_code = error.code(),
            tags = ?tags,
            context = %context,
            "Captured exception: {}",
            error
        );
    }
}

/// One captured failure, as stored by `RecordingSink`
#[derive(Debug, Clone)]
pub struct CapturedException {
    pub error: ErrorResponse,
    pub tags: Tags,
    pub context: Context,
}

impl CapturedException {
    pub fn action(&self) -> Option<&str> {
        self.tags.get("action").map(String::as_str)
    }
}

/// In-memory sink for tests and diagnostics
#[derive(Debug, Default)]
pub struct RecordingSink {
    captured: Mutex<Vec<CapturedException>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> Vec<CapturedException> {
        self.captured.lock().clone()
    }

    /// Actions of all captured failures, in capture order
    pub fn actions(&self) -> Vec<String> {
        self.captured
            .lock()
            .iter()
            .filter_map(|c| c.action().map(str::to_string))
            .collect()
    }
}

impl ExceptionSink for RecordingSink {
    fn capture(&self, error: &AppError, tags: &Tags, context: &Context) {
        self.captured.lock().push(CapturedException {
            error: ErrorResponse::from(error),
            tags: tags.clone(),
            context: context.clone(),
        });
    }
}
