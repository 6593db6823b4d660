//! Services Layer
//!
//! Pipeline logic driven by the scheduler.
//!
//! ```text
//! Scheduler --> RefreshService --> MetricsSource (earnings + equities)
//!                              └--> MetricsStore
//! ```
//!
//! # Services
//!
//! - `RefreshService` - Rate-limited refresh of every stale instrument

pub mod refresh_service;

pub use refresh_service::{RefreshService, RefreshSettings, RunState, RunSummary, Stage};
