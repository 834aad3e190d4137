//! European Black-Scholes-Merton with continuous dividend yield.

use super::math::{forward_price, intrinsic, normal_cdf, normal_pdf, EPSILON};
use crate::domain::{OptionContractSpec, OptionType, PricingResult};

/// `(d1, d2)` for a non-degenerate spec.
fn d1_d2(spec: &OptionContractSpec) -> (f64, f64) {
    let t = spec.expiry_years;
    let vol_sqrt_t = spec.iv * t.sqrt();
    let fwd = forward_price(spec.spot, t, spec.rate, spec.dividend_yield);
    let d1 = ((fwd / spec.strike).ln() + 0.5 * spec.iv * spec.iv * t) / vol_sqrt_t;
    (d1, d1 - vol_sqrt_t)
}

/// `d1` as used by the BAW boundary condition at an arbitrary spot.
pub(crate) fn d1_at(spec: &OptionContractSpec, spot: f64) -> f64 {
    d1_d2(&spec.with_spot(spot)).0
}

/// Black-Scholes price. Collapses to intrinsic value when `T ≤ ε`.
pub fn price(spec: &OptionContractSpec) -> f64 {
    let t = spec.expiry_years;
    if t <= EPSILON {
        return intrinsic(spec.spot, spec.strike, spec.option_type);
    }

    let (d1, d2) = d1_d2(spec);
    let df_q = (-spec.dividend_yield * t).exp();
    let df_r = (-spec.rate * t).exp();

    match spec.option_type {
        OptionType::Call => spec.spot * df_q * normal_cdf(d1) - spec.strike * df_r * normal_cdf(d2),
        OptionType::Put => spec.strike * df_r * normal_cdf(-d2) - spec.spot * df_q * normal_cdf(-d1),
    }
}

/// Closed-form price and Greeks.
///
/// Theta is per calendar day, vega per vol point, rho per 1% of rate.
pub fn greeks(spec: &OptionContractSpec) -> PricingResult {
    let t = spec.expiry_years;
    if t <= EPSILON {
        return expired(spec);
    }

    let s = spec.spot;
    let k = spec.strike;
    let r = spec.rate;
    let q = spec.dividend_yield;
    let sqrt_t = t.sqrt();

    let (d1, d2) = d1_d2(spec);
    let df_q = (-q * t).exp();
    let df_r = (-r * t).exp();
    let pdf_d1 = normal_pdf(d1);

    let gamma = df_q * pdf_d1 / (s * spec.iv * sqrt_t);
    let vega = s * df_q * pdf_d1 * sqrt_t * 0.01;
    let decay = -s * df_q * pdf_d1 * spec.iv / (2.0 * sqrt_t);

    let (price, delta, theta_annual, rho) = match spec.option_type {
        OptionType::Call => {
            let nd1 = normal_cdf(d1);
            let nd2 = normal_cdf(d2);
            (
                s * df_q * nd1 - k * df_r * nd2,
                df_q * nd1,
                decay - r * k * df_r * nd2 + q * s * df_q * nd1,
                k * t * df_r * nd2 * 0.01,
            )
        }
        OptionType::Put => {
            let nmd1 = normal_cdf(-d1);
            let nmd2 = normal_cdf(-d2);
            (
                k * df_r * nmd2 - s * df_q * nmd1,
                -df_q * nmd1,
                decay + r * k * df_r * nmd2 - q * s * df_q * nmd1,
                -k * t * df_r * nmd2 * 0.01,
            )
        }
    };

    PricingResult {
        price,
        delta,
        gamma,
        theta: theta_annual / 365.0,
        vega,
        rho,
    }
}

/// Intrinsic value with a step delta; every other sensitivity is zero.
pub(crate) fn expired(spec: &OptionContractSpec) -> PricingResult {
    let value = intrinsic(spec.spot, spec.strike, spec.option_type);
    let delta = match spec.option_type {
        OptionType::Call if spec.spot > spec.strike => 1.0,
        OptionType::Put if spec.spot < spec.strike => -1.0,
        _ => 0.0,
    };
    PricingResult {
        price: value,
        delta,
        ..Default::default()
    }
}
