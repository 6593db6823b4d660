//! Earnings endpoint payload

use super::{decode_object, non_empty, null_as_default, parse_rfc3339};
use crate::db::models::{OverviewMetricsRecord, QuarterlyHistoryRecord};
use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EarningsResponse {
    pub success: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(rename = "secId", deserialize_with = "null_as_default")]
    pub sec_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data: EarningsData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EarningsData {
    #[serde(deserialize_with = "null_as_default")]
    pub instrument_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub market: String,
    #[serde(deserialize_with = "null_as_default")]
    pub currency: String,
    pub market_cap: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub last_actual_fiscal_period: String,
    pub expected_report_date: Option<String>,
    pub time_last_updated: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub last_actual: EarningsLastActual,
    #[serde(deserialize_with = "null_as_default")]
    pub history: EarningsHistory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EarningsLastActual {
    pub eps_actual: Option<f64>,
    pub revenue_actual: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EarningsHistory {
    #[serde(deserialize_with = "null_as_default")]
    pub quarterly: HashMap<String, EarningsQuarter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EarningsQuarter {
    pub eps_actual: Option<f64>,
    pub eps_surprise: Option<f64>,
    pub eps_surprise_percent: Option<f64>,
    pub revenue_actual: Option<f64>,
    pub revenue_surprise: Option<f64>,
    pub revenue_surprise_percent: Option<f64>,
    pub forecast_source: Option<String>,
    pub eps_forecast: Option<f64>,
    pub revenue_forecast: Option<f64>,
    pub earning_release_date: Option<String>,
    #[serde(rename = "EPSGAAPConsensusMedian")]
    pub eps_gaap_consensus_median: Option<f64>,
    #[serde(rename = "EPSNormalizedConsensusMedian")]
    pub eps_normalized_consensus_median: Option<f64>,
    pub ciq_fiscal_period_type: Option<String>,
    pub calendar_period_type: Option<String>,
    pub calendar_period_start_date: Option<String>,
    pub calendar_period_end_date: Option<String>,
    #[serde(rename = "PrimaryEPS")]
    pub primary_eps: Option<String>,
}

impl EarningsResponse {
    pub fn decode(body: &[u8]) -> Result<Self> {
        decode_object(body)
    }

    /// Quarterly rows ordered by period code, keyed by the tracked `symbol`
    pub fn to_quarterly_history(&self, symbol: &str) -> Result<Vec<QuarterlyHistoryRecord>> {
        let quarterly = &self.data.history.quarterly;
        let mut periods: Vec<&String> = quarterly.keys().collect();
        periods.sort();

        let mut records = Vec::with_capacity(periods.len());

        for period in periods {
            let quarter = &quarterly[period];

            let release_date = parse_rfc3339(
                &format!("earning release date for period {}", period),
                quarter.earning_release_date.as_deref(),
            )?;
            let start_date = parse_rfc3339(
                &format!("calendar period start date for period {}", period),
                quarter.calendar_period_start_date.as_deref(),
            )?;
            let end_date = parse_rfc3339(
                &format!("calendar period end date for period {}", period),
                quarter.calendar_period_end_date.as_deref(),
            )?;

            records.push(QuarterlyHistoryRecord {
                symbol: symbol.to_string(),
                sec_id: non_empty(&self.sec_id),
                instrument_id: non_empty(&self.data.instrument_id),
                period_code: period.clone(),
                eps_actual: quarter.eps_actual,
                eps_surprise: quarter.eps_surprise,
                eps_surprise_percent: quarter.eps_surprise_percent,
                revenue_actual: quarter.revenue_actual,
                revenue_surprise: quarter.revenue_surprise,
                revenue_surprise_percent: quarter.revenue_surprise_percent,
                forecast_source: quarter.forecast_source.clone(),
                eps_forecast: quarter.eps_forecast,
                revenue_forecast: quarter.revenue_forecast,
                earning_release_date: release_date,
                eps_gaap_consensus_median: quarter.eps_gaap_consensus_median,
                eps_normalized_consensus_median: quarter.eps_normalized_consensus_median,
                ciq_fiscal_period_type: quarter.ciq_fiscal_period_type.clone(),
                calendar_period_type: quarter.calendar_period_type.clone(),
                calendar_period_start_date: start_date,
                calendar_period_end_date: end_date,
                primary_eps: quarter.primary_eps.clone(),
            });
        }

        Ok(records)
    }

    /// Overview record seeded from the latest actual fiscal period
    ///
    /// The payload's own `symbol` is informational; rows are keyed by the
    /// tracked symbol so the freshness marker always lands.
    pub fn to_overview_seed(&self, symbol: &str) -> Result<OverviewMetricsRecord> {
        let next_expected_report_date =
            parse_rfc3339("expected report date", self.data.expected_report_date.as_deref())?;
        let source_time_last_updated =
            parse_rfc3339("source time last updated", self.data.time_last_updated.as_deref())?;

        Ok(OverviewMetricsRecord {
            symbol: symbol.to_string(),
            sec_id: non_empty(&self.sec_id),
            instrument_id: non_empty(&self.data.instrument_id),
            market: non_empty(&self.data.market),
            currency: non_empty(&self.data.currency),
            market_cap: self.data.market_cap,
            last_actual_period_code: non_empty(&self.data.last_actual_fiscal_period),
            last_actual_quarter_eps: self.data.last_actual.eps_actual,
            last_actual_quarter_revenue: self.data.last_actual.revenue_actual,
            next_expected_report_date,
            source_time_last_updated,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    const SAMPLE: &str = r#"{
        "success": true,
        "symbol": "BBCA",
        "secId": "0P0000AAAA",
        "data": {
            "InstrumentId": "ins-1",
            "Market": "id-id",
            "Currency": "IDR",
            "MarketCap": 1.1e15,
            "LastActualFiscalPeriod": "2024Q1",
            "ExpectedReportDate": "2024-07-20T00:00:00Z",
            "TimeLastUpdated": "2024-05-01T10:15:00+07:00",
            "LastActual": { "EpsActual": 110.5, "RevenueActual": 2.3e13 },
            "History": {
                "quarterly": {
                    "2024Q1": {
                        "EpsActual": 110.5,
                        "EpsForecast": 105.0,
                        "EPSGAAPConsensusMedian": 104.0,
                        "PrimaryEPS": "GAAP",
                        "EarningReleaseDate": "2024-04-22T00:00:00Z",
                        "CalendarPeriodStartDate": "2024-01-01T00:00:00Z",
                        "CalendarPeriodEndDate": "2024-03-31T00:00:00Z"
                    },
                    "2023Q3": { "EpsActual": 98.1, "EarningReleaseDate": "" },
                    "2023Q4": { "EpsActual": 101.2, "ForecastSource": null }
                }
            }
        }
    }"#;

    #[test]
    fn test_quarterly_history_sorted_by_period() {
        let earnings = EarningsResponse::decode(SAMPLE.as_bytes()).unwrap();
        let records = earnings.to_quarterly_history("BBCA").unwrap();

        let periods: Vec<&str> = records.iter().map(|r| r.period_code.as_str()).collect();
        assert_eq!(periods, vec!["2023Q3", "2023Q4", "2024Q1"]);

        let latest = &records[2];
        assert_eq!(latest.symbol, "BBCA");
        assert_eq!(latest.sec_id.as_deref(), Some("0P0000AAAA"));
        assert_eq!(latest.instrument_id.as_deref(), Some("ins-1"));
        assert_eq!(latest.eps_actual, Some(110.5));
        assert_eq!(latest.eps_gaap_consensus_median, Some(104.0));
        assert_eq!(latest.primary_eps.as_deref(), Some("GAAP"));
        assert!(latest.earning_release_date.is_some());
        assert!(latest.calendar_period_end_date.is_some());

        // Empty date strings mean "no value"
        assert_eq!(records[0].earning_release_date, None);
        assert_eq!(records[1].forecast_source, None);
    }

    #[test]
    fn test_quarterly_history_rejects_bad_date() {
        let body = r#"{
            "symbol": "BBRI",
            "data": { "History": { "quarterly": {
                "2024Q1": { "EarningReleaseDate": "22/04/2024" }
            } } }
        }"#;
        let earnings = EarningsResponse::decode(body.as_bytes()).unwrap();
        let err = earnings.to_quarterly_history("BBRI").unwrap_err();
        assert!(matches!(err, AppError::FieldParse { .. }));
        assert!(err.to_string().contains("2024Q1"));
    }

    #[test]
    fn test_empty_history() {
        let earnings = EarningsResponse::decode(br#"{"symbol":"TLKM","data":{}}"#).unwrap();
        assert!(earnings.to_quarterly_history("TLKM").unwrap().is_empty());

        let earnings = EarningsResponse::decode(br#"{"symbol":"TLKM","data":null}"#).unwrap();
        assert!(earnings.to_quarterly_history("TLKM").unwrap().is_empty());
    }

    #[test]
    fn test_overview_seed() {
        let earnings = EarningsResponse::decode(SAMPLE.as_bytes()).unwrap();
        let seed = earnings.to_overview_seed("BBCA").unwrap();

        assert_eq!(seed.symbol, "BBCA");
        assert_eq!(seed.currency.as_deref(), Some("IDR"));
        assert_eq!(seed.market_cap, Some(1.1e15));
        assert_eq!(seed.last_actual_period_code.as_deref(), Some("2024Q1"));
        assert_eq!(seed.last_actual_quarter_eps, Some(110.5));
        assert_eq!(seed.last_actual_quarter_revenue, Some(2.3e13));
        assert!(seed.next_expected_report_date.is_some());
        assert!(seed.source_time_last_updated.is_some());
        assert_eq!(seed.beta, None);
    }

    #[test]
    fn test_seed_without_payload_symbol() {
        let earnings = EarningsResponse::decode(br#"{"data":{"Currency":""}}"#).unwrap();
        let seed = earnings.to_overview_seed("ASII").unwrap();
        assert_eq!(seed.symbol, "ASII");
        assert_eq!(seed.currency, None);
    }

    #[test]
    fn test_rows_keyed_by_tracked_symbol() {
        let body = SAMPLE.replace(r#""symbol": "BBCA""#, r#""symbol": "BBCA.JK""#);
        let earnings = EarningsResponse::decode(body.as_bytes()).unwrap();
        assert_eq!(earnings.symbol, "BBCA.JK");

        let records = earnings.to_quarterly_history("BBCA").unwrap();
        assert!(records.iter().all(|r| r.symbol == "BBCA"));
        assert_eq!(earnings.to_overview_seed("BBCA").unwrap().symbol, "BBCA");
    }

    #[test]
    fn test_seed_rejects_bad_report_date() {
        let earnings =
            EarningsResponse::decode(br#"{"data":{"ExpectedReportDate":"soon"}}"#).unwrap();
        assert!(matches!(
            earnings.to_overview_seed("ASII"),
            Err(AppError::FieldParse { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(matches!(
            EarningsResponse::decode(b"[1, 2, 3]"),
            Err(AppError::Decode(_))
        ));
        assert!(matches!(
            EarningsResponse::decode(br#"{"data":{"History":{"quarterly":[]}}}"#),
            Err(AppError::Decode(_))
        ));
        assert!(matches!(EarningsResponse::decode(b"[]"), Err(AppError::Decode(_))));
        assert!(matches!(EarningsResponse::decode(b"null"), Err(AppError::Decode(_))));
        assert!(EarningsResponse::decode(b"<html>").is_err());
    }
}
