//! Scheduler module
//!
//! Drives the periodic fundamentals refresh:
//! - One run immediately at startup
//! - Then daily at the configured local time (default 01:00 Asia/Jakarta)

mod refresh_scheduler;
mod schedule;

pub use refresh_scheduler::RefreshScheduler;
pub use schedule::Schedule;
