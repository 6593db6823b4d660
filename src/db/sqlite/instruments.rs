//! Tracked instruments and their freshness marker

use super::{format_time, read_time};
use crate::db::models::TrackedInstrument;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Add an instrument, or replace the credential of an existing one
pub fn register_instrument(conn: &Connection, symbol: &str, api_key: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO tracked_instruments (symbol, api_key) VALUES (?1, ?2)
         ON CONFLICT(symbol) DO UPDATE SET api_key = excluded.api_key",
        params![symbol, api_key],
    )?;
    tracing::info!(ticker = %symbol, "Registered tracked instrument");
    Ok(())
}

/// Instruments with a credential whose marker is unset or older than `cutoff`,
/// never-refreshed first
pub fn select_stale(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<Vec<TrackedInstrument>> {
    let mut stmt = conn.prepare(
        "SELECT symbol, api_key FROM tracked_instruments
         WHERE api_key IS NOT NULL AND api_key <> ''
           AND (last_refreshed_at IS NULL OR last_refreshed_at < ?1)
         ORDER BY last_refreshed_at IS NOT NULL, last_refreshed_at, symbol",
    )?;

    let instruments = stmt
        .query_map([format_time(cutoff)], |row| {
            Ok(TrackedInstrument::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    tracing::debug!("Selected {} stale instruments", instruments.len());
    Ok(instruments)
}

/// Set the freshness marker; unknown symbols are left alone
pub fn touch(conn: &Connection, symbol: &str, now: &str) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE tracked_instruments SET last_refreshed_at = ?2 WHERE symbol = ?1",
        params![symbol, now],
    )?;
    Ok(updated)
}

pub fn get_last_refreshed(conn: &Connection, symbol: &str) -> Result<Option<DateTime<Utc>>> {
    let refreshed = conn
        .query_row(
            "SELECT last_refreshed_at FROM tracked_instruments WHERE symbol = ?1",
            [symbol],
            |row| read_time(row, "last_refreshed_at"),
        )
        .optional()?;
    Ok(refreshed.flatten())
}
