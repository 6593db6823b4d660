//! Fundamentals Sync - Financial Metrics Ingestion
//!
//! Periodically refreshes per-instrument fundamentals by pulling two upstream
//! payloads (earnings and equities), reconciling them into one overview
//! record plus quarterly history, and upserting the result into SQLite.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod monitoring;
pub mod normalize;
pub mod scheduler;
pub mod services;
pub mod sources;
pub mod state;

use anyhow::Context;
use clock::CachedClock;
use config::AppConfig;
use scheduler::RefreshScheduler;
use state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fundamentals_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on ctrl-c, or SIGTERM on unix; yields the signal name
async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
    }
}

/// Run the refresh scheduler until ctrl-c or SIGTERM
pub async fn run() -> anyhow::Result<()> {
    init_tracing();
    tracing::info!("Starting fundamentals sync...");

    let config = AppConfig::load().context("Failed to load configuration")?;
    let timezone = config.timezone()?;
    let grace = config.shutdown_grace();

    let shutdown = CancellationToken::new();

    let clock = CachedClock::new();
    let clock_handle = Arc::new(clock.handle());
    let clock_task = clock.start(config.clock_granularity(), shutdown.clone());

    let state = AppState::new(config, clock_handle)?;

    let scheduler = RefreshScheduler::new(
        state.refresh.clone(),
        state.clock.clone(),
        &state.config.schedule.expression,
        timezone,
    );
    let mut scheduler_task = scheduler
        .start(shutdown.clone())
        .context("Failed to register refresh schedule")?;

    tokio::select! {
        signal = shutdown_signal() => {
            let name = signal.context("Failed to listen for shutdown signal")?;
            tracing::info!(signal = name, "Shutdown signal received");
        }
        result = &mut scheduler_task => {
            shutdown.cancel();
            clock_task.await.ok();
            anyhow::bail!("Refresh scheduler exited unexpectedly: {:?}", result);
        }
    }

    shutdown.cancel();
    match tokio::time::timeout(grace, scheduler_task).await {
        Ok(Ok(())) => tracing::info!("Refresh scheduler shut down cleanly"),
        Ok(Err(e)) => tracing::error!("Refresh scheduler task failed: {}", e),
        Err(_) => tracing::warn!(
            "In-flight refresh did not stop within {}s; exiting anyway",
            grace.as_secs()
        ),
    }
    clock_task.await.ok();

    tracing::info!("Fundamentals sync stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_resolves_shutdown_signal() {
        let mut pending = Box::pin(shutdown_signal());
        // First poll installs the handler
        assert!(tokio::time::timeout(Duration::from_millis(50), &mut pending)
            .await
            .is_err());

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let name = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name, "SIGTERM");
    }
}
