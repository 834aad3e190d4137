use crate::domain::{Decimal, OptionContractSpec, PricingMethod, PricingResult};
use crate::instruments::{parse_occ_symbol, SymbolError};
use crate::marketdata::{ExerciseStyle, MarketData, MarketDataError};
use crate::pricing::{PricingEngine, PricingError, PricingRequest};
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Theoretical value and Greeks for an option, from live inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionQuote {
    pub occ_symbol: String,
    pub method: PricingMethod,
    pub multiplier: Decimal,
    pub spec: OptionContractSpec,
    pub result: PricingResult,
}

/// Prices options from market data through a shared engine.
#[derive(Clone)]
pub struct OptionQuoter {
    market: Arc<dyn MarketData>,
    engine: Arc<PricingEngine>,
    american_method: PricingMethod,
    risk_free_rate: f64,
}

impl OptionQuoter {
    pub fn new(
        market: Arc<dyn MarketData>,
        engine: Arc<PricingEngine>,
        american_method: PricingMethod,
        risk_free_rate: f64,
    ) -> Self {
        Self {
            market,
            engine,
            american_method,
            risk_free_rate,
        }
    }

    /// European-style contracts always use Black-Scholes; the tree also
    /// receives the underlying's upcoming dividends.
    pub async fn quote(
        &self,
        occ_symbol: &str,
        valuation_date: NaiveDate,
    ) -> Result<OptionQuote, QuoteError> {
        let occ = occ_symbol.trim().to_ascii_uppercase();
        let contract = parse_occ_symbol(&occ)?;
        let snapshot = self.market.option_snapshot(&occ).await?;

        let spot = match snapshot.underlying_price {
            Some(px) if px.is_finite() && px > 0.0 => px,
            _ => self.market.underlying_price(&contract.root).await?,
        };

        let method = match snapshot.exercise_style {
            ExerciseStyle::European => PricingMethod::BlackScholes,
            ExerciseStyle::American => self.american_method,
        };

        let dividends = match method {
            PricingMethod::AmericanCrr => self
                .market
                .dividends(&contract.root, valuation_date)
                .await?
                .upcoming(valuation_date),
            PricingMethod::BlackScholes | PricingMethod::AmericanFast => Vec::new(),
        };

        let days = (contract.expiry - valuation_date).num_days().max(0);
        let spec = OptionContractSpec::new(
            contract.right,
            spot,
            contract.strike.to_f64(),
            days as f64 / 365.0,
            snapshot.implied_volatility,
            self.risk_free_rate,
            0.0,
        );

        let request = PricingRequest::new(spec, method).with_dividends(dividends);
        let result = self.engine.greeks(&request)?;
        debug!(
            occ = %occ,
            method = %method,
            price = result.price,
            delta = result.delta,
            "Quoted option"
        );

        Ok(OptionQuote {
            occ_symbol: occ,
            method,
            multiplier: snapshot.multiplier,
            spec,
            result,
        })
    }
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error(transparent)]
    MarketData(#[from] MarketDataError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
}
