//! Overview record reconciliation
//!
//! The earnings seed is built first; the equities payload is then applied as
//! an ordered list of patches. A patch writes a field only when the source
//! carries a usable value: `None`, NaN, infinities and empty strings never
//! replace what is already there. Within one merge the last usable
//! assignment in patch order wins, which matters for the ratios that both
//! the key-metrics and company-metrics groups report.

use super::equities::EquitiesResponse;
use super::{non_empty, parse_rfc3339};
use crate::db::models::OverviewMetricsRecord;
use crate::error::Result;
use chrono::{DateTime, Utc};

type Patch = fn(&mut OverviewMetricsRecord, &EquitiesResponse) -> Result<()>;

const PATCHES: &[Patch] = &[
    patch_identity,
    patch_key_metrics,
    patch_company_metrics,
    patch_share_statistics,
    patch_headline,
    patch_annual_statement,
    patch_dates,
];

/// Merge equities-derived fields into `record`
///
/// On a malformed date the merge stops; fields applied before the failing
/// patch stay in the record.
pub fn merge_equities(
    record: &mut OverviewMetricsRecord,
    equities: &EquitiesResponse,
) -> Result<()> {
    for patch in PATCHES {
        patch(record, equities)?;
    }
    Ok(())
}

fn set_float(dest: &mut Option<f64>, src: Option<f64>) {
    if let Some(value) = src {
        if value.is_finite() {
            *dest = Some(value);
        }
    }
}

fn set_string(dest: &mut Option<String>, src: Option<&String>) {
    if let Some(value) = src {
        if !value.is_empty() {
            *dest = Some(value.clone());
        }
    }
}

fn set_int(dest: &mut Option<i64>, src: Option<i64>) {
    if src.is_some() {
        *dest = src;
    }
}

fn set_time(dest: &mut Option<DateTime<Utc>>, src: Option<DateTime<Utc>>) {
    if src.is_some() {
        *dest = src;
    }
}

fn fill_if_unset(dest: &mut Option<String>, src: &str) {
    if dest.is_none() {
        *dest = non_empty(src);
    }
}

// Identity fields are set once and never replaced
fn patch_identity(r: &mut OverviewMetricsRecord, e: &EquitiesResponse) -> Result<()> {
    if r.symbol.is_empty() {
        r.symbol = e.symbol.clone();
    }
    fill_if_unset(&mut r.sec_id, &e.sec_id);
    fill_if_unset(&mut r.instrument_id, &e.data.instrument_id);
    fill_if_unset(&mut r.market, &e.data.market);
    fill_if_unset(&mut r.currency, &e.data.currency);
    Ok(())
}

fn patch_key_metrics(r: &mut OverviewMetricsRecord, e: &EquitiesResponse) -> Result<()> {
    let k = &e.data.analysis.key_metrics;
    set_float(&mut r.beta, e.data.beta);
    set_float(&mut r.eps, k.eps);
    set_float(&mut r.book_value_per_share, k.book_value_per_share);
    set_float(&mut r.latest_revenue_per_share, k.latest_revenue_per_share);
    set_string(&mut r.profitability, k.profitability.as_ref());
    set_float(&mut r.stock_growth, k.stock_growth);
    set_float(&mut r.latest_revenue, k.latest_revenue);
    set_float(&mut r.latest_income, k.latest_income);
    set_float(&mut r.latest_net_profit_margin, k.latest_net_profit_margin);
    set_float(&mut r.current_ratio, k.current_ratio);
    set_float(&mut r.debt_to_equity_ratio, k.debt_to_equity_ratio);
    set_float(&mut r.forward_price_to_eps, k.forward_price_to_eps);
    set_float(&mut r.forward_dividend_yield, k.forward_dividend_yield);
    set_float(&mut r.payout_ratio, k.payout_ratio);
    set_float(&mut r.price_to_book_ratio, k.price_to_book_ratio);
    set_float(&mut r.return_on_assets, k.return_on_assets);
    set_float(&mut r.return_on_capital, k.return_on_capital);
    set_float(&mut r.return_on_equity, k.return_on_equity);
    Ok(())
}

fn patch_company_metrics(r: &mut OverviewMetricsRecord, e: &EquitiesResponse) -> Result<()> {
    let c = &e.data.analysis.company_metrics;
    set_float(&mut r.pe_5y_high_ratio, c.pe_5y_high_ratio);
    set_float(&mut r.pe_5y_low_ratio, c.pe_5y_low_ratio);
    set_float(&mut r.revenue_ytd_ytd, c.revenue_ytd_ytd);
    set_float(&mut r.revenue_qq_last_year_growth_rate, c.revenue_qq_last_year_growth_rate);
    set_float(&mut r.net_income_ytd_ytd_growth_rate, c.net_income_ytd_ytd_growth_rate);
    set_float(&mut r.net_income_qq_last_year_growth_rate, c.net_income_qq_last_year_growth_rate);
    set_float(&mut r.revenue_5y_avg_growth_rate, c.revenue_5y_avg_growth_rate);
    set_float(&mut r.net_income_5y_avg_growth_rate, c.net_income_5y_avg_growth_rate);
    set_float(&mut r.dividend_5y_avg_growth_rate, c.dividend_5y_avg_growth_rate);
    set_float(&mut r.dividend_yield, c.dividend_yield);
    // TODO: current_ratio, debt_to_equity_ratio, payout_ratio and price_to_book_ratio
    // below overwrite the key-metrics values; confirm with the provider which group is
    // authoritative and drop the duplicate assignment.
    set_float(&mut r.current_ratio, c.current_ratio);
    set_float(&mut r.debt_asset_ratio, c.debt_asset_ratio);
    set_float(&mut r.leverage_ratio, c.leverage_ratio);
    set_float(&mut r.interest_coverage, c.interest_coverage);
    set_float(&mut r.price_cash_flow_ratio, c.price_cash_flow_ratio);
    set_float(&mut r.revenue_3y_avg, c.revenue_3y_avg);
    set_float(&mut r.trailing_annual_dividend_yield, c.trailing_annual_dividend_yield);
    set_float(&mut r.price_to_book_ratio, c.price_book_ratio);
    set_float(&mut r.price_to_sales_ratio, c.price_sales_ratio);
    set_float(&mut r.book_value_share_ratio, c.book_value_share_ratio);
    set_float(&mut r.operating_cash_flow, c.operating_cash_flow);
    set_float(&mut r.payout_ratio, c.payout_ratio);
    set_float(&mut r.quick_ratio, c.quick_ratio);
    set_float(&mut r.current, c.current);
    set_float(&mut r.debt_to_equity_ratio, c.debt_equity_ratio);
    set_float(&mut r.diluted_eps_3y_growth, c.diluted_eps_3y_growth);
    set_float(&mut r.pe_growth_ratio, c.pe_growth_ratio);
    set_float(&mut r.gross_margin, c.gross_margin);
    set_float(&mut r.pretax_margin, c.pre_tax_margin);
    set_float(&mut r.net_profit_margin, c.net_profit_margin);
    set_float(&mut r.average_gross_margin_5y, c.average_gross_margin_5y);
    set_float(&mut r.average_pretax_margin_5y, c.average_pre_tax_margin_5y);
    set_float(&mut r.average_net_profit_margin_5y, c.average_net_profit_margin_5y);
    set_float(&mut r.operating_margin, c.operating_margin);
    set_float(&mut r.net_margin_percent, c.net_margin_percent);
    set_float(&mut r.return_on_equity, c.return_on_equity_current);
    set_float(&mut r.return_on_equity_5y_avg, c.return_on_equity_5y_avg);
    set_float(&mut r.return_on_assets, c.return_on_asset_current);
    set_float(&mut r.return_on_assets_5y_avg, c.return_on_asset_5y_avg);
    set_float(&mut r.return_on_capital, c.return_on_capital_current);
    set_float(&mut r.return_on_capital_5y_avg, c.return_on_capital_5y_avg);
    set_float(&mut r.income_employee, c.income_employee);
    set_float(&mut r.revenue_employee, c.revenue_employee);
    set_float(&mut r.asset_turnover, c.asset_turnover);
    set_float(&mut r.inventory_turnover, c.inventory_turnover);
    set_float(&mut r.receivable_turnover, c.receivable_turnover);
    set_float(&mut r.roa_ttm, c.roa_ttm);
    Ok(())
}

fn patch_share_statistics(r: &mut OverviewMetricsRecord, e: &EquitiesResponse) -> Result<()> {
    let s = &e.data.analysis.share_statistics;
    set_float(&mut r.average_dividend_yield_5y, s.average_dividend_yield_5y);
    set_string(&mut r.last_split_factor, s.last_split_factor.as_ref());
    set_float(&mut r.ex_dividend_amount, s.ex_dividend_amount);
    set_int(&mut r.shares_outstanding, s.shares_outstanding);
    set_float(&mut r.enterprise_value, s.enterprise_value);
    set_float(&mut r.dividend_yield, s.dividend_yield);
    Ok(())
}

fn patch_headline(r: &mut OverviewMetricsRecord, e: &EquitiesResponse) -> Result<()> {
    set_float(&mut r.market_cap, e.data.market_cap);
    set_float(&mut r.enterprise_value, e.data.enterprise_value);
    Ok(())
}

fn patch_annual_statement(r: &mut OverviewMetricsRecord, e: &EquitiesResponse) -> Result<()> {
    if let Some(latest) = e.latest_annual_statement() {
        set_float(&mut r.assets, latest.assets);
        set_float(&mut r.liabilities, latest.liabilities);
    }
    Ok(())
}

// All dates are validated before any is applied
fn patch_dates(r: &mut OverviewMetricsRecord, e: &EquitiesResponse) -> Result<()> {
    let s = &e.data.analysis.share_statistics;
    let last_split_date = parse_rfc3339("last split date", s.last_split_date.as_deref())?;
    let declaration_date = parse_rfc3339("declaration date", s.declaration_date.as_deref())?;
    let dividend_date = parse_rfc3339("dividend date", s.dividend_date.as_deref())?;
    let ex_dividend_date = parse_rfc3339("ex-dividend date", s.ex_dividend_date.as_deref())?;
    let time_last_updated =
        parse_rfc3339("source time last updated", e.data.time_last_updated.as_deref())?;

    set_time(&mut r.last_split_date, last_split_date);
    set_time(&mut r.declaration_date, declaration_date);
    set_time(&mut r.dividend_date, dividend_date);
    set_time(&mut r.ex_dividend_date, ex_dividend_date);
    set_time(&mut r.source_time_last_updated, time_last_updated);
    Ok(())
}
