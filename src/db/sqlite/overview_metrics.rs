//! Overview metrics, one row per instrument

use super::{format_opt_time, instruments, read_time};
use crate::db::models::OverviewMetricsRecord;
use crate::error::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};

/// Column order shared by the upsert and the read-back query
const COLUMNS: &[&str] = &[
    "symbol", "sec_id", "instrument_id", "market", "currency",
    "last_actual_period_code", "last_actual_quarter_eps", "last_actual_quarter_revenue",
    "next_expected_report_date", "source_time_last_updated", "market_cap",
    "enterprise_value", "beta", "eps", "book_value_per_share",
    "latest_revenue_per_share", "forward_price_to_eps", "price_to_book_ratio",
    "price_to_sales_ratio", "price_cash_flow_ratio", "pe_5y_high_ratio",
    "pe_5y_low_ratio", "pe_growth_ratio", "book_value_share_ratio", "stock_growth",
    "revenue_ytd_ytd", "revenue_qq_last_year_growth_rate",
    "net_income_ytd_ytd_growth_rate", "net_income_qq_last_year_growth_rate",
    "revenue_5y_avg_growth_rate", "net_income_5y_avg_growth_rate",
    "dividend_5y_avg_growth_rate", "revenue_3y_avg", "diluted_eps_3y_growth",
    "profitability", "latest_revenue", "latest_income", "latest_net_profit_margin",
    "operating_cash_flow", "gross_margin", "pretax_margin", "net_profit_margin",
    "average_gross_margin_5y", "average_pretax_margin_5y",
    "average_net_profit_margin_5y", "operating_margin", "net_margin_percent",
    "return_on_assets", "return_on_capital", "return_on_equity",
    "return_on_equity_5y_avg", "return_on_assets_5y_avg", "return_on_capital_5y_avg",
    "roa_ttm", "income_employee", "revenue_employee", "asset_turnover",
    "inventory_turnover", "receivable_turnover", "current_ratio", "quick_ratio",
    "current", "debt_to_equity_ratio", "debt_asset_ratio", "leverage_ratio",
    "interest_coverage", "assets", "liabilities", "forward_dividend_yield",
    "dividend_yield", "trailing_annual_dividend_yield", "payout_ratio",
    "average_dividend_yield_5y", "ex_dividend_amount", "shares_outstanding",
    "last_split_factor", "last_split_date", "declaration_date", "dividend_date",
    "ex_dividend_date",
];

fn upsert_sql() -> String {
    let names: Vec<String> = COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
    let placeholders: Vec<String> = (1..=COLUMNS.len() + 1).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = names
        .iter()
        .skip(1)
        .map(|c| format!("{c} = excluded.{c}", c = c))
        .collect();

    format!(
        "INSERT INTO stock_overview_metrics ({}, updated_at) VALUES ({})
         ON CONFLICT(symbol) DO UPDATE SET {}, updated_at = excluded.updated_at",
        names.join(", "),
        placeholders.join(", "),
        updates.join(", "),
    )
}

fn select_sql() -> String {
    let names: Vec<String> = COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
    format!(
        "SELECT {} FROM stock_overview_metrics WHERE symbol = ?1",
        names.join(", ")
    )
}

/// Upsert the record and touch its freshness marker in one transaction
pub fn upsert_overview_metrics(
    conn: &mut Connection,
    record: &OverviewMetricsRecord,
    now: &str,
) -> Result<()> {
    let next_expected_report_date = format_opt_time(&record.next_expected_report_date);
    let source_time_last_updated = format_opt_time(&record.source_time_last_updated);
    let last_split_date = format_opt_time(&record.last_split_date);
    let declaration_date = format_opt_time(&record.declaration_date);
    let dividend_date = format_opt_time(&record.dividend_date);
    let ex_dividend_date = format_opt_time(&record.ex_dividend_date);

    let values: Vec<&dyn ToSql> = vec![
        &record.symbol,
        &record.sec_id,
        &record.instrument_id,
        &record.market,
        &record.currency,
        &record.last_actual_period_code,
        &record.last_actual_quarter_eps,
        &record.last_actual_quarter_revenue,
        &next_expected_report_date,
        &source_time_last_updated,
        &record.market_cap,
        &record.enterprise_value,
        &record.beta,
        &record.eps,
        &record.book_value_per_share,
        &record.latest_revenue_per_share,
        &record.forward_price_to_eps,
        &record.price_to_book_ratio,
        &record.price_to_sales_ratio,
        &record.price_cash_flow_ratio,
        &record.pe_5y_high_ratio,
        &record.pe_5y_low_ratio,
        &record.pe_growth_ratio,
        &record.book_value_share_ratio,
        &record.stock_growth,
        &record.revenue_ytd_ytd,
        &record.revenue_qq_last_year_growth_rate,
        &record.net_income_ytd_ytd_growth_rate,
        &record.net_income_qq_last_year_growth_rate,
        &record.revenue_5y_avg_growth_rate,
        &record.net_income_5y_avg_growth_rate,
        &record.dividend_5y_avg_growth_rate,
        &record.revenue_3y_avg,
        &record.diluted_eps_3y_growth,
        &record.profitability,
        &record.latest_revenue,
        &record.latest_income,
        &record.latest_net_profit_margin,
        &record.operating_cash_flow,
        &record.gross_margin,
        &record.pretax_margin,
        &record.net_profit_margin,
        &record.average_gross_margin_5y,
        &record.average_pretax_margin_5y,
        &record.average_net_profit_margin_5y,
        &record.operating_margin,
        &record.net_margin_percent,
        &record.return_on_assets,
        &record.return_on_capital,
        &record.return_on_equity,
        &record.return_on_equity_5y_avg,
        &record.return_on_assets_5y_avg,
        &record.return_on_capital_5y_avg,
        &record.roa_ttm,
        &record.income_employee,
        &record.revenue_employee,
        &record.asset_turnover,
        &record.inventory_turnover,
        &record.receivable_turnover,
        &record.current_ratio,
        &record.quick_ratio,
        &record.current,
        &record.debt_to_equity_ratio,
        &record.debt_asset_ratio,
        &record.leverage_ratio,
        &record.interest_coverage,
        &record.assets,
        &record.liabilities,
        &record.forward_dividend_yield,
        &record.dividend_yield,
        &record.trailing_annual_dividend_yield,
        &record.payout_ratio,
        &record.average_dividend_yield_5y,
        &record.ex_dividend_amount,
        &record.shares_outstanding,
        &record.last_split_factor,
        &last_split_date,
        &declaration_date,
        &dividend_date,
        &ex_dividend_date,
        &now,
    ];

    let tx = conn.transaction()?;
    tx.execute(&upsert_sql(), rusqlite::params_from_iter(values))?;
    instruments::touch(&tx, &record.symbol, now)?;
    tx.commit()?;

    tracing::info!(ticker = %record.symbol, "Upserted overview metrics");
    Ok(())
}

pub fn get_overview_metrics(
    conn: &Connection,
    symbol: &str,
) -> Result<Option<OverviewMetricsRecord>> {
    let record = conn
        .query_row(&select_sql(), [symbol], read_record)
        .optional()?;
    Ok(record)
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<OverviewMetricsRecord> {
    Ok(OverviewMetricsRecord {
        symbol: row.get("symbol")?,
        sec_id: row.get("sec_id")?,
        instrument_id: row.get("instrument_id")?,
        market: row.get("market")?,
        currency: row.get("currency")?,
        last_actual_period_code: row.get("last_actual_period_code")?,
        last_actual_quarter_eps: row.get("last_actual_quarter_eps")?,
        last_actual_quarter_revenue: row.get("last_actual_quarter_revenue")?,
        next_expected_report_date: read_time(row, "next_expected_report_date")?,
        source_time_last_updated: read_time(row, "source_time_last_updated")?,
        market_cap: row.get("market_cap")?,
        enterprise_value: row.get("enterprise_value")?,
        beta: row.get("beta")?,
        eps: row.get("eps")?,
        book_value_per_share: row.get("book_value_per_share")?,
        latest_revenue_per_share: row.get("latest_revenue_per_share")?,
        forward_price_to_eps: row.get("forward_price_to_eps")?,
        price_to_book_ratio: row.get("price_to_book_ratio")?,
        price_to_sales_ratio: row.get("price_to_sales_ratio")?,
        price_cash_flow_ratio: row.get("price_cash_flow_ratio")?,
        pe_5y_high_ratio: row.get("pe_5y_high_ratio")?,
        pe_5y_low_ratio: row.get("pe_5y_low_ratio")?,
        pe_growth_ratio: row.get("pe_growth_ratio")?,
        book_value_share_ratio: row.get("book_value_share_ratio")?,
        stock_growth: row.get("stock_growth")?,
        revenue_ytd_ytd: row.get("revenue_ytd_ytd")?,
        revenue_qq_last_year_growth_rate: row.get("revenue_qq_last_year_growth_rate")?,
        net_income_ytd_ytd_growth_rate: row.get("net_income_ytd_ytd_growth_rate")?,
        net_income_qq_last_year_growth_rate: row.get("net_income_qq_last_year_growth_rate")?,
        revenue_5y_avg_growth_rate: row.get("revenue_5y_avg_growth_rate")?,
        net_income_5y_avg_growth_rate: row.get("net_income_5y_avg_growth_rate")?,
        dividend_5y_avg_growth_rate: row.get("dividend_5y_avg_growth_rate")?,
        revenue_3y_avg: row.get("revenue_3y_avg")?,
        diluted_eps_3y_growth: row.get("diluted_eps_3y_growth")?,
        profitability: row.get("profitability")?,
        latest_revenue: row.get("latest_revenue")?,
        latest_income: row.get("latest_income")?,
        latest_net_profit_margin: row.get("latest_net_profit_margin")?,
        operating_cash_flow: row.get("operating_cash_flow")?,
        gross_margin: row.get("gross_margin")?,
        pretax_margin: row.get("pretax_margin")?,
        net_profit_margin: row.get("net_profit_margin")?,
        average_gross_margin_5y: row.get("average_gross_margin_5y")?,
        average_pretax_margin_5y: row.get("average_pretax_margin_5y")?,
        average_net_profit_margin_5y: row.get("average_net_profit_margin_5y")?,
        operating_margin: row.get("operating_margin")?,
        net_margin_percent: row.get("net_margin_percent")?,
        return_on_assets: row.get("return_on_assets")?,
        return_on_capital: row.get("return_on_capital")?,
        return_on_equity: row.get("return_on_equity")?,
        return_on_equity_5y_avg: row.get("return_on_equity_5y_avg")?,
        return_on_assets_5y_avg: row.get("return_on_assets_5y_avg")?,
        return_on_capital_5y_avg: row.get("return_on_capital_5y_avg")?,
        roa_ttm: row.get("roa_ttm")?,
        income_employee: row.get("income_employee")?,
        revenue_employee: row.get("revenue_employee")?,
        asset_turnover: row.get("asset_turnover")?,
        inventory_turnover: row.get("inventory_turnover")?,
        receivable_turnover: row.get("receivable_turnover")?,
        current_ratio: row.get("current_ratio")?,
        quick_ratio: row.get("quick_ratio")?,
        current: row.get("current")?,
        debt_to_equity_ratio: row.get("debt_to_equity_ratio")?,
        debt_asset_ratio: row.get("debt_asset_ratio")?,
        leverage_ratio: row.get("leverage_ratio")?,
        interest_coverage: row.get("interest_coverage")?,
        assets: row.get("assets")?,
        liabilities: row.get("liabilities")?,
        forward_dividend_yield: row.get("forward_dividend_yield")?,
        dividend_yield: row.get("dividend_yield")?,
        trailing_annual_dividend_yield: row.get("trailing_annual_dividend_yield")?,
        payout_ratio: row.get("payout_ratio")?,
        average_dividend_yield_5y: row.get("average_dividend_yield_5y")?,
        ex_dividend_amount: row.get("ex_dividend_amount")?,
        shares_outstanding: row.get("shares_outstanding")?,
        last_split_factor: row.get("last_split_factor")?,
        last_split_date: read_time(row, "last_split_date")?,
        declaration_date: read_time(row, "declaration_date")?,
        dividend_date: read_time(row, "dividend_date")?,
        ex_dividend_date: read_time(row, "ex_dividend_date")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::{format_time, migrations};
    use chrono::{TimeZone, Utc};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        instruments::register_instrument(&conn, "BBCA", "key").unwrap();
        conn
    }

    fn sample() -> OverviewMetricsRecord {
        OverviewMetricsRecord {
            symbol: "BBCA".to_string(),
            currency: Some("IDR".to_string()),
            market_cap: Some(1.0e13),
            beta: Some(1.2),
            current: Some(0.9),
            shares_outstanding: Some(123_275_050_000),
            last_split_factor: Some("5:1".to_string()),
            ex_dividend_date: Some(Utc.with_ymd_and_hms(2024, 3, 26, 0, 0, 0).unwrap()),
            ..OverviewMetricsRecord::for_symbol("BBCA")
        }
    }

    #[test]
    fn test_columns_match_schema() {
        let conn = setup();
        let count: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('stock_overview_metrics')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, COLUMNS.len() + 1);
    }

    #[test]
    fn test_upsert_and_read_back() {
        let mut conn = setup();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap();

        upsert_overview_metrics(&mut conn, &sample(), &format_time(&now)).unwrap();

        assert_eq!(get_overview_metrics(&conn, "BBCA").unwrap(), Some(sample()));
        assert_eq!(instruments::get_last_refreshed(&conn, "BBCA").unwrap(), Some(now));
        assert_eq!(get_overview_metrics(&conn, "BBRI").unwrap(), None);
    }

    #[test]
    fn test_upsert_overwrites_all_columns() {
        let mut conn = setup();
        let now = format_time(&Utc::now());
        upsert_overview_metrics(&mut conn, &sample(), &now).unwrap();

        let replacement = OverviewMetricsRecord {
            beta: Some(0.7),
            ..OverviewMetricsRecord::for_symbol("BBCA")
        };
        upsert_overview_metrics(&mut conn, &replacement, &now).unwrap();
        upsert_overview_metrics(&mut conn, &replacement, &now).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM stock_overview_metrics", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(get_overview_metrics(&conn, "BBCA").unwrap(), Some(replacement));
    }

    #[test]
    fn test_failed_upsert_keeps_marker() {
        let mut conn = setup();
        let record = OverviewMetricsRecord::for_symbol("");
        assert!(upsert_overview_metrics(&mut conn, &record, &format_time(&Utc::now())).is_err());
        assert_eq!(instruments::get_last_refreshed(&conn, "BBCA").unwrap(), None);
    }
}
