//! Cox-Ross-Rubinstein tree for American options with discrete dividends.

use super::math::{intrinsic, EPSILON};
use super::PricingError;
use crate::domain::{DiscreteDividend, OptionContractSpec};

pub const MIN_STEPS: usize = 500;
pub const MAX_STEPS: usize = 1000;
const STEPS_PER_YEAR: f64 = 504.0;
/// Largest log distance from spot to the lattice edge; `exp` overflows past ~709.
const MAX_LOG_SPREAD: f64 = 700.0;

/// Step count for a horizon: two steps per trading day, clamped to
/// `[MIN_STEPS, MAX_STEPS]`.
pub fn steps_for(expiry_years: f64) -> usize {
    let raw = (expiry_years * STEPS_PER_YEAR).ceil();
    if raw.is_nan() || raw < MIN_STEPS as f64 {
        MIN_STEPS
    } else if raw > MAX_STEPS as f64 {
        MAX_STEPS
    } else {
        raw as usize
    }
}

/// Risk-neutral probability of an up move over one of `steps` steps.
pub fn up_probability(spec: &OptionContractSpec, steps: usize) -> f64 {
    let dt = spec.expiry_years / steps.max(1) as f64;
    let u = (spec.iv * dt.sqrt()).exp();
    let d = 1.0 / u;
    (((spec.rate - spec.dividend_yield) * dt).exp() - d) / (u - d)
}

/// Reject lattices whose probabilities or node spots would be meaningless.
pub fn check_lattice(spec: &OptionContractSpec, steps: usize) -> Result<(), PricingError> {
    if spec.expiry_years <= EPSILON {
        return Ok(());
    }
    let steps = steps.max(1);
    let spread = spec.iv * (spec.expiry_years * steps as f64).sqrt();
    if spread.is_nan() || spread >= MAX_LOG_SPREAD {
        return Err(PricingError::UnstableTree {
            reason: "node spots overflow",
            value: spread,
        });
    }
    let p = up_probability(spec, steps);
    if !(0.0..=1.0).contains(&p) {
        return Err(PricingError::UnstableTree {
            reason: "up probability outside [0, 1]",
            value: p,
        });
    }
    Ok(())
}

/// Tree price with the step count derived from the horizon.
pub fn price(spec: &OptionContractSpec, dividends: &[DiscreteDividend]) -> f64 {
    price_with_steps(spec, dividends, steps_for(spec.expiry_years))
}

/// Tree price with an explicit step count.
///
/// `dividends` are year offsets from valuation; entries at or before zero
/// are ignored.
pub fn price_with_steps(
    spec: &OptionContractSpec,
    dividends: &[DiscreteDividend],
    steps: usize,
) -> f64 {
    let t = spec.expiry_years;
    if t <= EPSILON {
        return intrinsic(spec.spot, spec.strike, spec.option_type);
    }
    let steps = steps.max(1);

    let dt = t / steps as f64;
    let u = (spec.iv * dt.sqrt()).exp();
    let d = 1.0 / u;
    let u2 = u * u;
    let disc = (-spec.rate * dt).exp();
    let p = up_probability(spec, steps);

    let upcoming: Vec<DiscreteDividend> = dividends
        .iter()
        .copied()
        .filter(|div| div.time > 0.0 && div.time <= t)
        .collect();
    let level_spot = |level: usize| -> f64 {
        let time = level as f64 * dt;
        let paid: f64 = upcoming
            .iter()
            .filter(|div| div.time <= time)
            .map(|div| div.amount * (-spec.dividend_yield * (time - div.time)).exp())
            .sum();
        (spec.spot - paid).max(0.0)
    };

    let mut values = vec![0.0_f64; steps + 1];
    let mut node = level_spot(steps) * d.powi(steps as i32);
    for v in values.iter_mut() {
        *v = intrinsic(node, spec.strike, spec.option_type);
        node *= u2;
    }

    for level in (0..steps).rev() {
        let mut node = level_spot(level) * d.powi(level as i32);
        for j in 0..=level {
            let continuation = disc * (p * values[j + 1] + (1.0 - p) * values[j]);
            let exercise = intrinsic(node, spec.strike, spec.option_type);
            values[j] = continuation.max(exercise);
            node *= u2;
        }
    }

    values[0]
}
