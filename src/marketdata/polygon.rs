//! Polygon.io REST client.

use super::{ExerciseStyle, MarketData, MarketDataError, OptionSnapshot};
use crate::domain::{Decimal, Dividend, DividendSchedule};
use crate::instruments::{parse_occ_symbol, STANDARD_OPTION_MULTIPLIER};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Polygon client. Construct once and share by `Arc`.
#[derive(Debug, Clone)]
pub struct PolygonClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry_budget: Duration,
}

impl PolygonClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, MarketDataError> {
        if api_key.trim().is_empty() {
            return Err(MarketDataError::MissingApiKey);
        }
        Ok(Self {
            client: Client::new(),
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_budget: Duration::from_secs(30),
        })
    }

    /// Total time spent retrying transient failures before giving up.
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_budget),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(query)
                .query(&[("apiKey", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(MarketDataError::Network(e.to_string()))
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(url = %url, "Polygon rate limit hit, backing off");
                return Err(backoff::Error::transient(MarketDataError::RateLimited));
            }
            if status.is_server_error() {
                warn!(url = %url, status = status.as_u16(), "Polygon server error, retrying");
                return Err(backoff::Error::transient(MarketDataError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if status == StatusCode::NOT_FOUND {
                return Err(backoff::Error::permanent(MarketDataError::NotFound(path.to_string())));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(MarketDataError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| backoff::Error::permanent(MarketDataError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl MarketData for PolygonClient {
    async fn underlying_price(&self, symbol: &str) -> Result<f64, MarketDataError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        debug!(symbol = %symbol, "Fetching underlying snapshot");

        let path = format!("/v2/snapshot/locale/us/markets/stocks/tickers/{}", symbol);
        let response = self.get_json(&path, &[]).await?;
        parse_underlying_price(&response)
    }

    async fn option_snapshot(&self, occ_symbol: &str) -> Result<OptionSnapshot, MarketDataError> {
        let occ = occ_symbol.trim().to_ascii_uppercase();
        let parsed = parse_occ_symbol(&occ).map_err(|e| MarketDataError::Parse(e.to_string()))?;
        debug!(occ = %occ, "Fetching option snapshot");

        let path = format!("/v3/snapshot/options/{}/O:{}", parsed.root, occ);
        let response = self.get_json(&path, &[]).await?;
        parse_option_snapshot(&response)
    }

    async fn dividends(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> Result<DividendSchedule, MarketDataError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        debug!(symbol = %symbol, from = %from, "Fetching dividends");

        let query = [
            ("ticker", symbol.clone()),
            ("ex_dividend_date.gte", from.format("%Y-%m-%d").to_string()),
            ("order", "asc".to_string()),
            ("limit", "1000".to_string()),
        ];
        let response = self.get_json("/v3/reference/dividends", &query).await?;
        parse_dividends(&response)
    }
}

fn parse_underlying_price(response: &Value) -> Result<f64, MarketDataError> {
    let ticker = response
        .get("ticker")
        .ok_or_else(|| MarketDataError::Parse("Missing ticker field".to_string()))?;

    [("lastTrade", "p"), ("day", "c"), ("prevDay", "c")]
        .iter()
        .filter_map(|(section, field)| ticker.get(*section)?.get(*field)?.as_f64())
        .find(|px| px.is_finite() && *px > 0.0)
        .ok_or_else(|| MarketDataError::Parse("No usable price in snapshot".to_string()))
}

fn parse_option_snapshot(response: &Value) -> Result<OptionSnapshot, MarketDataError> {
    let results = response
        .get("results")
        .ok_or_else(|| MarketDataError::Parse("Missing results field".to_string()))?;

    let implied_volatility = results
        .get("implied_volatility")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| MarketDataError::Parse("Missing implied_volatility field".to_string()))?;

    let details = results.get("details");
    let multiplier = details
        .and_then(|d| d.get("shares_per_contract"))
        .and_then(|v| v.as_i64())
        .filter(|m| *m > 0)
        .unwrap_or(STANDARD_OPTION_MULTIPLIER);
    let exercise_style = match details
        .and_then(|d| d.get("exercise_style"))
        .and_then(|v| v.as_str())
    {
        Some(raw) => raw.parse().map_err(MarketDataError::Parse)?,
        None => ExerciseStyle::American,
    };
    let underlying_price = results
        .get("underlying_asset")
        .and_then(|u| u.get("price"))
        .and_then(|v| v.as_f64());

    Ok(OptionSnapshot {
        implied_volatility,
        multiplier: Decimal::from_i64(multiplier),
        exercise_style,
        underlying_price,
    })
}

fn parse_dividend(dividend_json: &Value) -> Result<Dividend, MarketDataError> {
    let ex_date_str = dividend_json
        .get("ex_dividend_date")
        .and_then(|v| v.as_str())
        .ok_or_else(|| MarketDataError::Parse("Missing ex_dividend_date field".to_string()))?;
    let ex_date = NaiveDate::parse_from_str(ex_date_str, "%Y-%m-%d")
        .map_err(|e| MarketDataError::Parse(format!("Invalid ex_dividend_date: {}", e)))?;

    let amount = dividend_json
        .get("cash_amount")
        .and_then(|v| v.as_f64())
        .filter(|a| a.is_finite() && *a >= 0.0)
        .ok_or_else(|| MarketDataError::Parse("Missing or invalid cash_amount".to_string()))?;

    Ok(Dividend { ex_date, amount })
}

fn parse_dividends(response: &Value) -> Result<DividendSchedule, MarketDataError> {
    let rows = response
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| MarketDataError::Parse("Expected results array".to_string()))?;

    let mut entries = Vec::new();
    for row in rows {
        match parse_dividend(row) {
            Ok(dividend) => entries.push(dividend),
            Err(e) => {
                warn!(error = %e, "Failed to parse dividend");
            }
        }
    }
    Ok(DividendSchedule::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            PolygonClient::new("  ", DEFAULT_BASE_URL),
            Err(MarketDataError::MissingApiKey)
        ));
    }

    #[test]
    fn test_parse_underlying_price_falls_back_to_prev_close() {
        let json = serde_json::json!({
            "ticker": {
                "ticker": "AAPL",
                "lastTrade": { "p": 0.0 },
                "prevDay": { "c": 189.25 }
            }
        });
        assert_eq!(parse_underlying_price(&json).unwrap(), 189.25);
    }

    #[test]
    fn test_parse_option_snapshot_defaults() {
        let json = serde_json::json!({
            "results": {
                "implied_volatility": 0.23,
                "details": { "contract_type": "call" }
            }
        });
        let snapshot = parse_option_snapshot(&json).unwrap();
        assert_eq!(snapshot.multiplier, Decimal::from_i64(100));
        assert_eq!(snapshot.exercise_style, ExerciseStyle::American);
        assert_eq!(snapshot.underlying_price, None);
    }

    #[test]
    fn test_parse_dividends_skips_bad_rows() {
        let json = serde_json::json!({
            "results": [
                { "ex_dividend_date": "2024-02-09", "cash_amount": 0.24 },
                { "ex_dividend_date": "not-a-date", "cash_amount": 0.24 },
                { "ex_dividend_date": "2024-05-10" }
            ]
        });
        let schedule = parse_dividends(&json).unwrap();
        assert_eq!(schedule.entries.len(), 1);
        assert_eq!(
            schedule.entries[0].ex_date,
            NaiveDate::from_ymd_opt(2024, 2, 9).unwrap()
        );
    }
}
