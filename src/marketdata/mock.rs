//! Mock market data for testing without network calls.

use super::{MarketData, MarketDataError, OptionSnapshot};
use crate::domain::{Dividend, DividendSchedule};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Mock market data that returns predefined values.
#[derive(Debug, Clone, Default)]
pub struct MockMarketData {
    prices: HashMap<String, f64>,
    options: HashMap<String, OptionSnapshot>,
    dividends: HashMap<String, Vec<Dividend>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_ascii_uppercase(), price);
        self
    }

    pub fn with_option(mut self, occ_symbol: &str, snapshot: OptionSnapshot) -> Self {
        self.options.insert(occ_symbol.to_ascii_uppercase(), snapshot);
        self
    }

    pub fn with_dividend(mut self, symbol: &str, dividend: Dividend) -> Self {
        self.dividends
            .entry(symbol.to_ascii_uppercase())
            .or_default()
            .push(dividend);
        self
    }
}

#[async_trait]
impl MarketData for MockMarketData {
    async fn underlying_price(&self, symbol: &str) -> Result<f64, MarketDataError> {
        self.prices
            .get(&symbol.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))
    }

    async fn option_snapshot(&self, occ_symbol: &str) -> Result<OptionSnapshot, MarketDataError> {
        self.options
            .get(&occ_symbol.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| MarketDataError::NotFound(occ_symbol.to_string()))
    }

    async fn dividends(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> Result<DividendSchedule, MarketDataError> {
        let entries = self
            .dividends
            .get(&symbol.to_ascii_uppercase())
            .map(|divs| divs.iter().filter(|d| d.ex_date >= from).copied().collect())
            .unwrap_or_default();
        Ok(DividendSchedule::new(entries))
    }
}
