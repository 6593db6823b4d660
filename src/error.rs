//! Application error types

use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Upstream request failed with status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid {field} '{value}': {reason}")]
    FieldParse {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable code used as the `error_code` monitoring tag
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Cancelled => "CANCELLED",
            AppError::UpstreamStatus { .. } => "UPSTREAM_STATUS_ERROR",
            AppError::Decode(_) => "DECODE_ERROR",
            AppError::FieldParse { .. } => "FIELD_PARSE_ERROR",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Pool(_) => "POOL_ERROR",
            AppError::Schedule(_) => "SCHEDULE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Network-level failures that isolate one source without touching the other
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::Transport(_) | AppError::Timeout(_) | AppError::UpstreamStatus { .. }
        )
    }

    pub(crate) fn field_parse(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        AppError::FieldParse {
            field: field.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Serializable error summary for monitoring payloads
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
