//! Option pricing inputs and outputs.

use super::OptionType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-quote pricing input. Never mutated; bumped copies are built with the
/// `with_*` helpers for finite differences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionContractSpec {
    /// Underlying price `S`.
    pub spot: f64,
    /// Strike `K`.
    pub strike: f64,
    /// Time to expiry in years `T`.
    pub expiry_years: f64,
    /// Implied volatility (decimal, 0.2 = 20%).
    pub iv: f64,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    /// Continuous dividend yield.
    pub dividend_yield: f64,
    pub option_type: OptionType,
}

impl OptionContractSpec {
    pub fn new(
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry_years: f64,
        iv: f64,
        rate: f64,
        dividend_yield: f64,
    ) -> Self {
        Self {
            spot,
            strike,
            expiry_years,
            iv,
            rate,
            dividend_yield,
            option_type,
        }
    }

    pub fn call(spot: f64, strike: f64, expiry_years: f64, iv: f64, rate: f64, q: f64) -> Self {
        Self::new(OptionType::Call, spot, strike, expiry_years, iv, rate, q)
    }

    pub fn put(spot: f64, strike: f64, expiry_years: f64, iv: f64, rate: f64, q: f64) -> Self {
        Self::new(OptionType::Put, spot, strike, expiry_years, iv, rate, q)
    }

    pub fn with_spot(self, spot: f64) -> Self {
        Self { spot, ..self }
    }

    pub fn with_expiry_years(self, expiry_years: f64) -> Self {
        Self {
            expiry_years,
            ..self
        }
    }

    pub fn with_iv(self, iv: f64) -> Self {
        Self { iv, ..self }
    }

    pub fn with_rate(self, rate: f64) -> Self {
        Self { rate, ..self }
    }

    pub fn intrinsic(&self) -> f64 {
        match self.option_type {
            OptionType::Call => (self.spot - self.strike).max(0.0),
            OptionType::Put => (self.strike - self.spot).max(0.0),
        }
    }
}

/// A single announced cash dividend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub ex_date: NaiveDate,
    /// Cash amount per share.
    pub amount: f64,
}

/// Announced dividends for an underlying, in any order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendSchedule {
    pub entries: Vec<Dividend>,
}

impl DividendSchedule {
    pub fn new(entries: Vec<Dividend>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dividends strictly after `valuation_date`, as year offsets (ACT/365),
    /// sorted by time then amount.
    pub fn upcoming(&self, valuation_date: NaiveDate) -> Vec<DiscreteDividend> {
        let mut out: Vec<DiscreteDividend> = self
            .entries
            .iter()
            .filter(|d| d.ex_date > valuation_date)
            .map(|d| DiscreteDividend {
                time: (d.ex_date - valuation_date).num_days() as f64 / 365.0,
                amount: d.amount,
            })
            .collect();
        sort_dividends(&mut out);
        out
    }
}

/// A dividend positioned on the pricing time axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscreteDividend {
    /// Years from valuation to the ex-date.
    pub time: f64,
    pub amount: f64,
}

pub(crate) fn sort_dividends(divs: &mut [DiscreteDividend]) {
    divs.sort_by(|a, b| {
        a.time
            .total_cmp(&b.time)
            .then_with(|| a.amount.total_cmp(&b.amount))
    });
}

/// Price and sensitivities.
///
/// `theta` is per calendar day, `vega` per vol point, `rho` per 1% of rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Pricing algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PricingMethod {
    /// European Black-Scholes; no early-exercise premium.
    #[default]
    #[serde(rename = "bs")]
    BlackScholes,
    /// Cox-Ross-Rubinstein tree with discrete dividends.
    #[serde(rename = "american-crr")]
    AmericanCrr,
    /// Barone-Adesi-Whaley approximation.
    #[serde(rename = "american-fast")]
    AmericanFast,
}

impl PricingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingMethod::BlackScholes => "bs",
            PricingMethod::AmericanCrr => "american-crr",
            PricingMethod::AmericanFast => "american-fast",
        }
    }
}

impl fmt::Display for PricingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "bs" => Ok(PricingMethod::BlackScholes),
            "american-crr" => Ok(PricingMethod::AmericanCrr),
            "american-fast" => Ok(PricingMethod::AmericanFast),
            other => Err(format!("unknown pricing method: {}", other)),
        }
    }
}
