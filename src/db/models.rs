//! Persisted domain records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Instrument eligible for a refresh, with its upstream credential
#[derive(Clone, PartialEq, Eq)]
pub struct TrackedInstrument {
    pub symbol: String,
    pub api_key: String,
}

impl TrackedInstrument {
    pub fn new(symbol: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            api_key: api_key.into(),
        }
    }

    /// Short hash of the credential, safe to log
    pub fn key_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.api_key.as_bytes());
        hex::encode(&digest[..4])
    }
}

// Keeps the credential out of logs and panics
impl fmt::Debug for TrackedInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedInstrument")
            .field("symbol", &self.symbol)
            .field("api_key", &format_args!("<{}>", self.key_fingerprint()))
            .finish()
    }
}

/// One fiscal period of earnings facts, keyed by (symbol, period_code)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyHistoryRecord {
    pub symbol: String,
    pub sec_id: Option<String>,
    pub instrument_id: Option<String>,
    pub period_code: String,
    pub eps_actual: Option<f64>,
    pub eps_surprise: Option<f64>,
    pub eps_surprise_percent: Option<f64>,
    pub revenue_actual: Option<f64>,
    pub revenue_surprise: Option<f64>,
    pub revenue_surprise_percent: Option<f64>,
    pub forecast_source: Option<String>,
    pub eps_forecast: Option<f64>,
    pub revenue_forecast: Option<f64>,
    pub earning_release_date: Option<DateTime<Utc>>,
    pub eps_gaap_consensus_median: Option<f64>,
    pub eps_normalized_consensus_median: Option<f64>,
    pub ciq_fiscal_period_type: Option<String>,
    pub calendar_period_type: Option<String>,
    pub calendar_period_start_date: Option<DateTime<Utc>>,
    pub calendar_period_end_date: Option<DateTime<Utc>>,
    pub primary_eps: Option<String>,
}

/// Current-state metrics for one instrument, keyed by symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverviewMetricsRecord {
    pub symbol: String,
    pub sec_id: Option<String>,
    pub instrument_id: Option<String>,
    pub market: Option<String>,
    pub currency: Option<String>,

    // Earnings-derived
    pub last_actual_period_code: Option<String>,
    pub last_actual_quarter_eps: Option<f64>,
    pub last_actual_quarter_revenue: Option<f64>,
    pub next_expected_report_date: Option<DateTime<Utc>>,
    pub source_time_last_updated: Option<DateTime<Utc>>,

    // Valuation
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub beta: Option<f64>,
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub latest_revenue_per_share: Option<f64>,
    pub forward_price_to_eps: Option<f64>,
    pub price_to_book_ratio: Option<f64>,
    pub price_to_sales_ratio: Option<f64>,
    pub price_cash_flow_ratio: Option<f64>,
    pub pe_5y_high_ratio: Option<f64>,
    pub pe_5y_low_ratio: Option<f64>,
    pub pe_growth_ratio: Option<f64>,
    pub book_value_share_ratio: Option<f64>,

    // Growth
    pub stock_growth: Option<f64>,
    pub revenue_ytd_ytd: Option<f64>,
    pub revenue_qq_last_year_growth_rate: Option<f64>,
    pub net_income_ytd_ytd_growth_rate: Option<f64>,
    pub net_income_qq_last_year_growth_rate: Option<f64>,
    pub revenue_5y_avg_growth_rate: Option<f64>,
    pub net_income_5y_avg_growth_rate: Option<f64>,
    pub dividend_5y_avg_growth_rate: Option<f64>,
    pub revenue_3y_avg: Option<f64>,
    pub diluted_eps_3y_growth: Option<f64>,

    // Income
    pub profitability: Option<String>,
    pub latest_revenue: Option<f64>,
    pub latest_income: Option<f64>,
    pub latest_net_profit_margin: Option<f64>,
    pub operating_cash_flow: Option<f64>,

    // Margins
    pub gross_margin: Option<f64>,
    pub pretax_margin: Option<f64>,
    pub net_profit_margin: Option<f64>,
    pub average_gross_margin_5y: Option<f64>,
    pub average_pretax_margin_5y: Option<f64>,
    pub average_net_profit_margin_5y: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin_percent: Option<f64>,

    // Returns
    pub return_on_assets: Option<f64>,
    pub return_on_capital: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_equity_5y_avg: Option<f64>,
    pub return_on_assets_5y_avg: Option<f64>,
    pub return_on_capital_5y_avg: Option<f64>,
    pub roa_ttm: Option<f64>,

    // Efficiency
    pub income_employee: Option<f64>,
    pub revenue_employee: Option<f64>,
    pub asset_turnover: Option<f64>,
    pub inventory_turnover: Option<f64>,
    pub receivable_turnover: Option<f64>,

    // Balance sheet
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub current: Option<f64>,
    pub debt_to_equity_ratio: Option<f64>,
    pub debt_asset_ratio: Option<f64>,
    pub leverage_ratio: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub assets: Option<f64>,
    pub liabilities: Option<f64>,

    // Dividends and shares
    pub forward_dividend_yield: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub trailing_annual_dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub average_dividend_yield_5y: Option<f64>,
    pub ex_dividend_amount: Option<f64>,
    pub shares_outstanding: Option<i64>,
    pub last_split_factor: Option<String>,
    pub last_split_date: Option<DateTime<Utc>>,
    pub declaration_date: Option<DateTime<Utc>>,
    pub dividend_date: Option<DateTime<Utc>>,
    pub ex_dividend_date: Option<DateTime<Utc>>,
}

impl OverviewMetricsRecord {
    /// Empty record carrying only the symbol
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_api_key() {
        let instrument = TrackedInstrument::new("BBCA", "super-secret-key");
        let printed = format!("{:?}", instrument);
        assert!(printed.contains("BBCA"));
        assert!(!printed.contains("super-secret-key"));
        assert!(printed.contains(&instrument.key_fingerprint()));
    }

    #[test]
    fn test_key_fingerprint_is_stable() {
        let a = TrackedInstrument::new("BBCA", "key-1");
        let b = TrackedInstrument::new("BBRI", "key-1");
        let c = TrackedInstrument::new("BBCA", "key-2");
        assert_eq!(a.key_fingerprint().len(), 8);
        assert_eq!(a.key_fingerprint(), b.key_fingerprint());
        assert_ne!(a.key_fingerprint(), c.key_fingerprint());
    }

    #[test]
    fn test_for_symbol() {
        let record = OverviewMetricsRecord::for_symbol("TLKM");
        assert_eq!(record.symbol, "TLKM");
        assert_eq!(record.market_cap, None);
        assert_eq!(record, OverviewMetricsRecord {
            symbol: "TLKM".to_string(),
            ..Default::default()
        });
    }
}
