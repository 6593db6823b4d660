//! Equities endpoint payload

use super::{decode_object, null_as_default};
use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EquitiesResponse {
    pub success: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(rename = "secId", deserialize_with = "null_as_default")]
    pub sec_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data: EquitiesData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EquitiesData {
    #[serde(deserialize_with = "null_as_default")]
    pub instrument_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub market: String,
    #[serde(deserialize_with = "null_as_default")]
    pub currency: String,
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub beta: Option<f64>,
    pub time_last_updated: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub analysis: EquitiesAnalysis,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EquitiesAnalysis {
    #[serde(deserialize_with = "null_as_default")]
    pub annual_statements: HashMap<String, AnnualStatement>,
    #[serde(deserialize_with = "null_as_default")]
    pub key_metrics: KeyMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub company_metrics: CompanyMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub share_statistics: ShareStatistics,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnnualStatement {
    pub assets: Option<f64>,
    pub liabilities: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyMetrics {
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub latest_revenue_per_share: Option<f64>,
    pub profitability: Option<String>,
    pub stock_growth: Option<f64>,
    pub latest_revenue: Option<f64>,
    pub latest_income: Option<f64>,
    pub latest_net_profit_margin: Option<f64>,
    pub current_ratio: Option<f64>,
    pub debt_to_equity_ratio: Option<f64>,
    #[serde(rename = "forwardPriceToEPS")]
    pub forward_price_to_eps: Option<f64>,
    pub forward_dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub price_to_book_ratio: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub return_on_capital: Option<f64>,
    pub return_on_equity: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompanyMetrics {
    #[serde(rename = "pE5YearHighRatio")]
    pub pe_5y_high_ratio: Option<f64>,
    #[serde(rename = "pE5YearLowRatio")]
    pub pe_5y_low_ratio: Option<f64>,
    #[serde(rename = "revenueYTDYTD")]
    pub revenue_ytd_ytd: Option<f64>,
    #[serde(rename = "revenueQQLastYearGrowthRate")]
    pub revenue_qq_last_year_growth_rate: Option<f64>,
    #[serde(rename = "netIncomeYTDYTDGrowthRate")]
    pub net_income_ytd_ytd_growth_rate: Option<f64>,
    #[serde(rename = "netIncomeQQLastYearGrowthRate")]
    pub net_income_qq_last_year_growth_rate: Option<f64>,
    #[serde(rename = "revenue5YearAverageGrowthRate")]
    pub revenue_5y_avg_growth_rate: Option<f64>,
    #[serde(rename = "netIncome5YearAverageGrowthRate")]
    pub net_income_5y_avg_growth_rate: Option<f64>,
    #[serde(rename = "dividend5YearAverageGrowthRate")]
    pub dividend_5y_avg_growth_rate: Option<f64>,
    pub forward_dividend_yield: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub current_ratio: Option<f64>,
    pub debt_asset_ratio: Option<f64>,
    pub leverage_ratio: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub price_cash_flow_ratio: Option<f64>,
    #[serde(rename = "revenue3YearAverage")]
    pub revenue_3y_avg: Option<f64>,
    pub trailing_annual_dividend_yield: Option<f64>,
    pub price_book_ratio: Option<f64>,
    pub price_sales_ratio: Option<f64>,
    pub book_value_share_ratio: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub current: Option<f64>,
    pub debt_equity_ratio: Option<f64>,
    #[serde(rename = "dilutedEPS3YearGrowth")]
    pub diluted_eps_3y_growth: Option<f64>,
    #[serde(rename = "pEGrowthRatio")]
    pub pe_growth_ratio: Option<f64>,
    pub gross_margin: Option<f64>,
    pub pre_tax_margin: Option<f64>,
    pub net_profit_margin: Option<f64>,
    #[serde(rename = "averageGrossMargin5Year")]
    pub average_gross_margin_5y: Option<f64>,
    #[serde(rename = "averagePreTaxMargin5Year")]
    pub average_pre_tax_margin_5y: Option<f64>,
    #[serde(rename = "averageNetProfitMargin5Year")]
    pub average_net_profit_margin_5y: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin_percent: Option<f64>,
    pub return_on_equity_current: Option<f64>,
    #[serde(rename = "returnOnEquity5YearAverage")]
    pub return_on_equity_5y_avg: Option<f64>,
    pub return_on_asset_current: Option<f64>,
    #[serde(rename = "returnOnAsset5YearAverage")]
    pub return_on_asset_5y_avg: Option<f64>,
    pub return_on_capital_current: Option<f64>,
    #[serde(rename = "returnOnCapital5YearAverage")]
    pub return_on_capital_5y_avg: Option<f64>,
    pub income_employee: Option<f64>,
    pub revenue_employee: Option<f64>,
    pub asset_turnover: Option<f64>,
    pub inventory_turnover: Option<f64>,
    pub receivable_turnover: Option<f64>,
    #[serde(rename = "roaTTM")]
    pub roa_ttm: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShareStatistics {
    #[serde(rename = "averageDividendYield5Year")]
    pub average_dividend_yield_5y: Option<f64>,
    pub last_split_factor: Option<String>,
    pub last_split_date: Option<String>,
    pub declaration_date: Option<String>,
    pub dividend_date: Option<String>,
    pub ex_dividend_date: Option<String>,
    pub ex_dividend_amount: Option<f64>,
    pub shares_outstanding: Option<i64>,
    pub enterprise_value: Option<f64>,
    pub dividend_yield: Option<f64>,
}

impl EquitiesResponse {
    pub fn decode(body: &[u8]) -> Result<Self> {
        decode_object(body)
    }

    /// Statement of the greatest numeric year key; non-numeric keys are ignored
    pub fn latest_annual_statement(&self) -> Option<&AnnualStatement> {
        self.data
            .analysis
            .annual_statements
            .iter()
            .filter_map(|(key, statement)| key.parse::<i32>().ok().map(|year| (year, statement)))
            .max_by_key(|(year, _)| *year)
            .map(|(_, statement)| statement)
    }
}
