//! Quarterly earnings history

use super::{format_opt_time, instruments, read_time};
use crate::db::models::QuarterlyHistoryRecord;
use crate::error::Result;
use rusqlite::{params, Connection};

/// Upsert a batch in one transaction, touching each owner's freshness marker.
/// Any failing row rolls back the whole batch.
pub fn upsert_quarterly_history(
    conn: &mut Connection,
    records: &[QuarterlyHistoryRecord],
    now: &str,
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;

    let mut stmt = tx.prepare(
        "INSERT INTO stock_quarterly_history (
            symbol, period_code, sec_id, instrument_id,
            eps_actual, eps_surprise, eps_surprise_percent,
            revenue_actual, revenue_surprise, revenue_surprise_percent,
            forecast_source, eps_forecast, revenue_forecast, earning_release_date,
            eps_gaap_consensus_median, eps_normalized_consensus_median,
            ciq_fiscal_period_type, calendar_period_type,
            calendar_period_start_date, calendar_period_end_date, primary_eps, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
         ON CONFLICT(symbol, period_code) DO UPDATE SET
            sec_id = excluded.sec_id,
            instrument_id = excluded.instrument_id,
            eps_actual = excluded.eps_actual,
            eps_surprise = excluded.eps_surprise,
            eps_surprise_percent = excluded.eps_surprise_percent,
            revenue_actual = excluded.revenue_actual,
            revenue_surprise = excluded.revenue_surprise,
            revenue_surprise_percent = excluded.revenue_surprise_percent,
            forecast_source = excluded.forecast_source,
            eps_forecast = excluded.eps_forecast,
            revenue_forecast = excluded.revenue_forecast,
            earning_release_date = excluded.earning_release_date,
            eps_gaap_consensus_median = excluded.eps_gaap_consensus_median,
            eps_normalized_consensus_median = excluded.eps_normalized_consensus_median,
            ciq_fiscal_period_type = excluded.ciq_fiscal_period_type,
            calendar_period_type = excluded.calendar_period_type,
            calendar_period_start_date = excluded.calendar_period_start_date,
            calendar_period_end_date = excluded.calendar_period_end_date,
            primary_eps = excluded.primary_eps,
            updated_at = excluded.updated_at",
    )?;

    for record in records {
        instruments::touch(&tx, &record.symbol, now)?;
        stmt.execute(params![
            record.symbol,
            record.period_code,
            record.sec_id,
            record.instrument_id,
            record.eps_actual,
            record.eps_surprise,
            record.eps_surprise_percent,
            record.revenue_actual,
            record.revenue_surprise,
            record.revenue_surprise_percent,
            record.forecast_source,
            record.eps_forecast,
            record.revenue_forecast,
            format_opt_time(&record.earning_release_date),
            record.eps_gaap_consensus_median,
            record.eps_normalized_consensus_median,
            record.ciq_fiscal_period_type,
            record.calendar_period_type,
            format_opt_time(&record.calendar_period_start_date),
            format_opt_time(&record.calendar_period_end_date),
            record.primary_eps,
            now,
        ])?;
    }

    drop(stmt);
    tx.commit()?;

    tracing::info!("Upserted {} quarterly history rows", records.len());
    Ok(())
}

/// All stored periods of an instrument, ordered by period code
pub fn get_quarterly_history(
    conn: &Connection,
    symbol: &str,
) -> Result<Vec<QuarterlyHistoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT symbol, period_code, sec_id, instrument_id,
                eps_actual, eps_surprise, eps_surprise_percent,
                revenue_actual, revenue_surprise, revenue_surprise_percent,
                forecast_source, eps_forecast, revenue_forecast, earning_release_date,
                eps_gaap_consensus_median, eps_normalized_consensus_median,
                ciq_fiscal_period_type, calendar_period_type,
                calendar_period_start_date, calendar_period_end_date, primary_eps
         FROM stock_quarterly_history WHERE symbol = ?1 ORDER BY period_code",
    )?;

    let records = stmt
        .query_map([symbol], |row| {
            Ok(QuarterlyHistoryRecord {
                symbol: row.get("symbol")?,
                period_code: row.get("period_code")?,
                sec_id: row.get("sec_id")?,
                instrument_id: row.get("instrument_id")?,
                eps_actual: row.get("eps_actual")?,
                eps_surprise: row.get("eps_surprise")?,
                eps_surprise_percent: row.get("eps_surprise_percent")?,
                revenue_actual: row.get("revenue_actual")?,
                revenue_surprise: row.get("revenue_surprise")?,
                revenue_surprise_percent: row.get("revenue_surprise_percent")?,
                forecast_source: row.get("forecast_source")?,
                eps_forecast: row.get("eps_forecast")?,
                revenue_forecast: row.get("revenue_forecast")?,
                earning_release_date: read_time(row, "earning_release_date")?,
                eps_gaap_consensus_median: row.get("eps_gaap_consensus_median")?,
                eps_normalized_consensus_median: row.get("eps_normalized_consensus_median")?,
                ciq_fiscal_period_type: row.get("ciq_fiscal_period_type")?,
                calendar_period_type: row.get("calendar_period_type")?,
                calendar_period_start_date: read_time(row, "calendar_period_start_date")?,
                calendar_period_end_date: read_time(row, "calendar_period_end_date")?,
                primary_eps: row.get("primary_eps")?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}
