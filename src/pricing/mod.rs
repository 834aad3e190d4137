//! Option pricing: Black-Scholes, Barone-Adesi-Whaley and a CRR tree, with
//! finite-difference Greeks and a bounded result cache.
//!
//! Inputs are validated once at the public entry points; the individual
//! pricers assume a valid spec.

pub mod baw;
pub mod binomial;
pub mod black_scholes;
pub mod cache;
pub mod engine;
pub mod greeks;
pub mod math;

pub use cache::{CacheStats, CachedPricing, PricingCache, PricingKey};
pub use engine::{PricingEngine, PricingRequest};

use crate::domain::{DiscreteDividend, OptionContractSpec, PricingMethod, PricingResult};
use math::EPSILON;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("invalid {field} = {value}: {reason}")]
    InvalidInput {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("binomial tree unstable: {reason} ({value})")]
    UnstableTree { reason: &'static str, value: f64 },
    #[error("{method} produced a non-finite {field}")]
    NonFinite {
        method: PricingMethod,
        field: &'static str,
    },
}

fn invalid(field: &'static str, value: f64, reason: &'static str) -> PricingError {
    PricingError::InvalidInput {
        field,
        value,
        reason,
    }
}

/// Reject specs the pricers cannot handle.
pub fn validate(spec: &OptionContractSpec) -> Result<(), PricingError> {
    let positive = [
        ("spot", spec.spot),
        ("strike", spec.strike),
        ("iv", spec.iv),
    ];
    for (field, value) in positive {
        if !value.is_finite() {
            return Err(invalid(field, value, "must be finite"));
        }
        if value <= 0.0 {
            return Err(invalid(field, value, "must be positive"));
        }
    }
    if !spec.expiry_years.is_finite() {
        return Err(invalid("expiry_years", spec.expiry_years, "must be finite"));
    }
    if spec.expiry_years < 0.0 {
        return Err(invalid("expiry_years", spec.expiry_years, "must not be negative"));
    }
    if !spec.rate.is_finite() {
        return Err(invalid("rate", spec.rate, "must be finite"));
    }
    if !spec.dividend_yield.is_finite() {
        return Err(invalid("dividend_yield", spec.dividend_yield, "must be finite"));
    }
    Ok(())
}

pub fn validate_dividends(dividends: &[DiscreteDividend]) -> Result<(), PricingError> {
    for div in dividends {
        if !div.time.is_finite() {
            return Err(invalid("dividend.time", div.time, "must be finite"));
        }
        if !div.amount.is_finite() || div.amount < 0.0 {
            return Err(invalid("dividend.amount", div.amount, "must be finite and non-negative"));
        }
    }
    Ok(())
}

/// Step count used for `method`; only the tree has one.
pub(crate) fn tree_steps(method: PricingMethod, expiry_years: f64) -> Option<usize> {
    match method {
        PricingMethod::AmericanCrr => Some(binomial::steps_for(expiry_years)),
        PricingMethod::BlackScholes | PricingMethod::AmericanFast => None,
    }
}

/// Method-specific preconditions beyond `validate`.
pub(crate) fn check_method(
    spec: &OptionContractSpec,
    method: PricingMethod,
    steps: Option<usize>,
) -> Result<(), PricingError> {
    match method {
        PricingMethod::AmericanCrr => {
            let steps = steps.unwrap_or_else(|| binomial::steps_for(spec.expiry_years));
            binomial::check_lattice(spec, steps)
        }
        PricingMethod::BlackScholes | PricingMethod::AmericanFast => Ok(()),
    }
}

/// Dispatch on a validated spec. Discrete dividends only affect the tree;
/// the closed forms see the continuous yield.
pub(crate) fn evaluate(
    spec: &OptionContractSpec,
    method: PricingMethod,
    dividends: &[DiscreteDividend],
    steps: Option<usize>,
) -> Result<f64, PricingError> {
    check_method(spec, method, steps)?;
    let value = match method {
        PricingMethod::BlackScholes => black_scholes::price(spec),
        PricingMethod::AmericanFast => baw::price(spec),
        PricingMethod::AmericanCrr => {
            let steps = steps.unwrap_or_else(|| binomial::steps_for(spec.expiry_years));
            binomial::price_with_steps(spec, dividends, steps)
        }
    };
    if !value.is_finite() {
        return Err(PricingError::NonFinite {
            method,
            field: "price",
        });
    }
    Ok(value)
}

/// Closed form for Black-Scholes, finite differences through `pricer`
/// otherwise. Every method reports exact intrinsic Greeks at expiry.
pub(crate) fn sensitivities<F>(spec: &OptionContractSpec, method: PricingMethod, pricer: F) -> PricingResult
where
    F: Fn(&OptionContractSpec) -> f64,
{
    if spec.expiry_years <= EPSILON {
        return black_scholes::expired(spec);
    }
    match method {
        PricingMethod::BlackScholes => black_scholes::greeks(spec),
        PricingMethod::AmericanFast | PricingMethod::AmericanCrr => {
            greeks::finite_difference(spec, pricer)
        }
    }
}

/// Reject results with any non-finite field.
pub(crate) fn ensure_finite(
    result: PricingResult,
    method: PricingMethod,
) -> Result<PricingResult, PricingError> {
    let fields = [
        ("price", result.price),
        ("delta", result.delta),
        ("gamma", result.gamma),
        ("theta", result.theta),
        ("vega", result.vega),
        ("rho", result.rho),
    ];
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((field, _)) => Err(PricingError::NonFinite {
            method,
            field: *field,
        }),
        None => Ok(result),
    }
}

/// Uncached price.
pub fn price(spec: &OptionContractSpec, method: PricingMethod) -> Result<f64, PricingError> {
    price_with_dividends(spec, method, &[])
}

pub fn price_with_dividends(
    spec: &OptionContractSpec,
    method: PricingMethod,
    dividends: &[DiscreteDividend],
) -> Result<f64, PricingError> {
    validate(spec)?;
    validate_dividends(dividends)?;
    evaluate(
        spec,
        method,
        dividends,
        tree_steps(method, spec.expiry_years),
    )
}

/// Uncached price and Greeks.
pub fn greeks(spec: &OptionContractSpec, method: PricingMethod) -> Result<PricingResult, PricingError> {
    greeks_with_dividends(spec, method, &[])
}

/// The tree step count is frozen at the base expiry for every bump.
pub fn greeks_with_dividends(
    spec: &OptionContractSpec,
    method: PricingMethod,
    dividends: &[DiscreteDividend],
) -> Result<PricingResult, PricingError> {
    validate(spec)?;
    validate_dividends(dividends)?;
    let steps = tree_steps(method, spec.expiry_years);
    check_method(spec, method, steps)?;
    // A bump that leaves the stable region surfaces as a non-finite Greek.
    let result = sensitivities(spec, method, |s| {
        evaluate(s, method, dividends, steps).unwrap_or(f64::NAN)
    });
    ensure_finite(result, method)
}
