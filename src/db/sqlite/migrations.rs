//! SQLite schema migrations

use crate::error::Result;
use rusqlite::Connection;

/// Apply every pending migration, in order
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_tracked_instruments", CREATE_TRACKED_INSTRUMENTS_TABLE)?;
    run_migration(conn, "002_stock_quarterly_history", CREATE_QUARTERLY_HISTORY_TABLE)?;
    run_migration(conn, "003_stock_overview_metrics", CREATE_OVERVIEW_METRICS_TABLE)?;

    tracing::debug!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let applied: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;

    if !applied {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?1)", [name])?;
    }

    Ok(())
}

const CREATE_TRACKED_INSTRUMENTS_TABLE: &str = r#"
CREATE TABLE tracked_instruments (
    symbol TEXT PRIMARY KEY,
    api_key TEXT,
    last_refreshed_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_tracked_instruments_refreshed ON tracked_instruments(last_refreshed_at);
"#;

const CREATE_QUARTERLY_HISTORY_TABLE: &str = r#"
CREATE TABLE stock_quarterly_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL CHECK (symbol <> ''),
    period_code TEXT NOT NULL CHECK (period_code <> ''),
    sec_id TEXT,
    instrument_id TEXT,
    eps_actual REAL,
    eps_surprise REAL,
    eps_surprise_percent REAL,
    revenue_actual REAL,
    revenue_surprise REAL,
    revenue_surprise_percent REAL,
    forecast_source TEXT,
    eps_forecast REAL,
    revenue_forecast REAL,
    earning_release_date TEXT,
    eps_gaap_consensus_median REAL,
    eps_normalized_consensus_median REAL,
    ciq_fiscal_period_type TEXT,
    calendar_period_type TEXT,
    calendar_period_start_date TEXT,
    calendar_period_end_date TEXT,
    primary_eps TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE(symbol, period_code)
);
"#;

const CREATE_OVERVIEW_METRICS_TABLE: &str = r#"
CREATE TABLE stock_overview_metrics (
    symbol TEXT PRIMARY KEY CHECK (symbol <> ''),
    sec_id TEXT,
    instrument_id TEXT,
    market TEXT,
    currency TEXT,
    last_actual_period_code TEXT,
    last_actual_quarter_eps REAL,
    last_actual_quarter_revenue REAL,
    next_expected_report_date TEXT,
    source_time_last_updated TEXT,
    market_cap REAL,
    enterprise_value REAL,
    beta REAL,
    eps REAL,
    book_value_per_share REAL,
    latest_revenue_per_share REAL,
    forward_price_to_eps REAL,
    price_to_book_ratio REAL,
    price_to_sales_ratio REAL,
    price_cash_flow_ratio REAL,
    pe_5y_high_ratio REAL,
    pe_5y_low_ratio REAL,
    pe_growth_ratio REAL,
    book_value_share_ratio REAL,
    stock_growth REAL,
    revenue_ytd_ytd REAL,
    revenue_qq_last_year_growth_rate REAL,
    net_income_ytd_ytd_growth_rate REAL,
    net_income_qq_last_year_growth_rate REAL,
    revenue_5y_avg_growth_rate REAL,
    net_income_5y_avg_growth_rate REAL,
    dividend_5y_avg_growth_rate REAL,
    revenue_3y_avg REAL,
    diluted_eps_3y_growth REAL,
    profitability TEXT,
    latest_revenue REAL,
    latest_income REAL,
    latest_net_profit_margin REAL,
    operating_cash_flow REAL,
    gross_margin REAL,
    pretax_margin REAL,
    net_profit_margin REAL,
    average_gross_margin_5y REAL,
    average_pretax_margin_5y REAL,
    average_net_profit_margin_5y REAL,
    operating_margin REAL,
    net_margin_percent REAL,
    return_on_assets REAL,
    return_on_capital REAL,
    return_on_equity REAL,
    return_on_equity_5y_avg REAL,
    return_on_assets_5y_avg REAL,
    return_on_capital_5y_avg REAL,
    roa_ttm REAL,
    income_employee REAL,
    revenue_employee REAL,
    asset_turnover REAL,
    inventory_turnover REAL,
    receivable_turnover REAL,
    current_ratio REAL,
    quick_ratio REAL,
    "current" REAL,
    debt_to_equity_ratio REAL,
    debt_asset_ratio REAL,
    leverage_ratio REAL,
    interest_coverage REAL,
    assets REAL,
    liabilities REAL,
    forward_dividend_yield REAL,
    dividend_yield REAL,
    trailing_annual_dividend_yield REAL,
    payout_ratio REAL,
    average_dividend_yield_5y REAL,
    ex_dividend_amount REAL,
    shares_outstanding INTEGER,
    last_split_factor TEXT,
    last_split_date TEXT,
    declaration_date TEXT,
    dividend_date TEXT,
    ex_dividend_date TEXT,
    updated_at TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 3);
    }
}
