//! Normal distribution helpers and small pricing formulas.

use crate::domain::OptionType;

/// Degenerate-expiry threshold in years.
pub const EPSILON: f64 = 1e-10;

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal CDF via `erf`.
#[inline]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Standard normal PDF.
#[inline]
pub fn normal_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Forward price `S·e^{(r−q)T}`.
#[inline]
pub fn forward_price(spot: f64, expiry_years: f64, rate: f64, dividend_yield: f64) -> f64 {
    spot * ((rate - dividend_yield) * expiry_years).exp()
}

#[inline]
pub fn intrinsic(spot: f64, strike: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}
