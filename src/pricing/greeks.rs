//! Finite-difference Greeks over an arbitrary pricer.

use crate::domain::{OptionContractSpec, PricingResult};

/// Bump size for spot, vol, rate, and (in days) time.
pub const BUMP: f64 = 0.01;
const DAYS_PER_YEAR: f64 = 365.0;

/// Centered finite differences around `spec`.
///
/// Scaling matches the closed-form Black-Scholes Greeks: theta per calendar
/// day, vega per vol point, rho per 1% of rate. Time and vol fall back to a
/// forward difference when the backward bump would leave the valid domain.
pub fn finite_difference<F>(spec: &OptionContractSpec, pricer: F) -> PricingResult
where
    F: Fn(&OptionContractSpec) -> f64,
{
    let h = BUMP;
    let base = pricer(spec);

    // Spot bump stays inside (0, S) for tiny underlyings.
    let hs = h.min(spec.spot * 0.5);
    let up = pricer(&spec.with_spot(spec.spot + hs));
    let down = pricer(&spec.with_spot(spec.spot - hs));
    let delta = (up - down) / (2.0 * hs);
    let gamma = (up - 2.0 * base + down) / (hs * hs);

    let dt = h / DAYS_PER_YEAR;
    let later = pricer(&spec.with_expiry_years(spec.expiry_years + dt));
    let theta = if spec.expiry_years - dt >= 0.0 {
        let earlier = pricer(&spec.with_expiry_years(spec.expiry_years - dt));
        -(later - earlier) / (2.0 * h)
    } else {
        -(later - base) / h
    };

    let vol_up = pricer(&spec.with_iv(spec.iv + h));
    let vega = if spec.iv > h {
        let vol_down = pricer(&spec.with_iv(spec.iv - h));
        (vol_up - vol_down) / 2.0
    } else {
        vol_up - base
    };

    let rate_up = pricer(&spec.with_rate(spec.rate + h));
    let rate_down = pricer(&spec.with_rate(spec.rate - h));
    let rho = (rate_up - rate_down) / 2.0;

    PricingResult {
        price: base,
        delta,
        gamma,
        theta,
        vega,
        rho,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::black_scholes;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_matches_closed_form_on_black_scholes() {
        let spec = OptionContractSpec::call(100.0, 105.0, 0.4, 0.3, 0.04, 0.01);
        let fd = finite_difference(&spec, black_scholes::price);
        let exact = black_scholes::greeks(&spec);

        assert_abs_diff_eq!(fd.price, exact.price, epsilon = 1e-12);
        assert_abs_diff_eq!(fd.delta, exact.delta, epsilon = 1e-4);
        assert_abs_diff_eq!(fd.gamma, exact.gamma, epsilon = 1e-4);
        assert_abs_diff_eq!(fd.theta, exact.theta, epsilon = 1e-4);
        assert_abs_diff_eq!(fd.vega, exact.vega, epsilon = 1e-3);
        assert_abs_diff_eq!(fd.rho, exact.rho, epsilon = 1e-3);
    }

    #[test]
    fn test_forward_difference_at_expiry() {
        let spec = OptionContractSpec::call(100.0, 100.0, 0.0, 0.2, 0.05, 0.0);
        let g = finite_difference(&spec, black_scholes::price);
        assert!(g.theta.is_finite());
        assert!(g.theta <= 0.0);
    }

    #[test]
    fn test_low_vol_uses_forward_difference() {
        let spec = OptionContractSpec::put(100.0, 100.0, 0.5, 0.005, 0.05, 0.0);
        let g = finite_difference(&spec, black_scholes::price);
        assert!(g.vega.is_finite());
    }
}
