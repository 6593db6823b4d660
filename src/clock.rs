//! Wall-clock sources
//!
//! `CachedClock` keeps "now" in an atomic refreshed by a single ticker task,
//! so hot paths read a timestamp without a syscall. Only the ticker writes;
//! every other holder gets a read-only `ClockHandle`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

fn system_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// Owner of the cached timestamp
pub struct CachedClock {
    now: Arc<AtomicI64>,
}

impl CachedClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(AtomicI64::new(system_nanos())),
        }
    }

    /// Read-only view for components that need "now"
    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            now: Arc::clone(&self.now),
        }
    }

    /// Start refreshing the timestamp every `granularity` until cancelled
    pub fn start(self, granularity: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(granularity);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.now.store(system_nanos(), Ordering::Relaxed);
                    }
                }
            }
            tracing::debug!("Clock ticker stopped");
        })
    }
}

impl Default for CachedClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheap, cloneable reader of a `CachedClock`
#[derive(Clone)]
pub struct ClockHandle {
    now: Arc<AtomicI64>,
}

impl Clock for ClockHandle {
    /// Never ahead of the real time; behind it by at most one tick
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.now.load(Ordering::Relaxed))
    }
}

/// Manually driven clock for deterministic timestamps
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_cached_clock_refreshes() {
        let clock = CachedClock::new();
        let handle = clock.handle();
        let first = handle.now();
        assert!(first <= Utc::now());

        let cancel = CancellationToken::new();
        let ticker = clock.start(Duration::from_millis(5), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.now() > first);

        cancel.cancel();
        ticker.await.unwrap();
    }

    #[test]
    fn test_fixed_clock() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::hours(3));
        assert_eq!(clock.now(), start + chrono::Duration::hours(3));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
