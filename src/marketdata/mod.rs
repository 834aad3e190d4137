//! Market data abstraction for the inputs option pricing needs: underlying
//! prices, option snapshots and announced dividends.

use crate::domain::{Decimal, DividendSchedule};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod mock;
pub mod polygon;

pub use mock::MockMarketData;
pub use polygon::PolygonClient;

/// Market data source.
///
/// Implementations handle retry/backoff and rate limiting themselves.
#[async_trait]
pub trait MarketData: Send + Sync + fmt::Debug {
    /// Latest traded price of an equity or ETF.
    async fn underlying_price(&self, symbol: &str) -> Result<f64, MarketDataError>;

    /// Snapshot of an option contract by compact OCC symbol.
    async fn option_snapshot(&self, occ_symbol: &str) -> Result<OptionSnapshot, MarketDataError>;

    /// Cash dividends with ex-date on or after `from`.
    async fn dividends(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> Result<DividendSchedule, MarketDataError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStyle {
    #[default]
    American,
    European,
}

impl FromStr for ExerciseStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "american" => Ok(ExerciseStyle::American),
            "european" => Ok(ExerciseStyle::European),
            other => Err(format!("unknown exercise style: {}", other)),
        }
    }
}

/// Pricing-relevant fields of an option quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSnapshot {
    pub implied_volatility: f64,
    /// Shares per contract.
    pub multiplier: Decimal,
    pub exercise_style: ExerciseStyle,
    /// Underlying price reported with the snapshot, if any.
    pub underlying_price: Option<f64>,
}

#[derive(Debug, Clone, Error)]
pub enum MarketDataError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Missing API key")]
    MissingApiKey,
}
