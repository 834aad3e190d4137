//! Barone-Adesi-Whaley quadratic approximation for American options.

use super::black_scholes::{self, d1_at};
use super::math::{intrinsic, normal_cdf, normal_pdf, EPSILON};
use crate::domain::{OptionContractSpec, OptionType};

const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-6;

/// Coefficients shared by the call and put boundary equations.
struct Quadratic {
    /// `M − N − 1` where `M = 2r/σ²`, `N = 2q/σ²`.
    beta: f64,
    /// `M` with `k = 1 − e^{−rT}` folded in (`M / k`).
    m_over_k: f64,
    /// `M` itself, for the perpetual (`k → 1`) seed.
    m: f64,
}

impl Quadratic {
    fn new(spec: &OptionContractSpec) -> Self {
        let var = spec.iv * spec.iv;
        let m = 2.0 * spec.rate / var;
        let n = 2.0 * spec.dividend_yield / var;
        let k = 1.0 - (-spec.rate * spec.expiry_years).exp();
        Self {
            beta: m - n - 1.0,
            m_over_k: m / k,
            m,
        }
    }

    fn disc(&self, c: f64) -> f64 {
        (self.beta * self.beta + 4.0 * c).sqrt()
    }

    /// Positive root (calls).
    fn q2(&self) -> f64 {
        (-self.beta + self.disc(self.m_over_k)) / 2.0
    }

    /// Negative root (puts).
    fn q1(&self) -> f64 {
        (-self.beta - self.disc(self.m_over_k)) / 2.0
    }

    fn q2_perpetual(&self) -> f64 {
        (-self.beta + self.disc(self.m)) / 2.0
    }

    fn q1_perpetual(&self) -> f64 {
        (-self.beta - self.disc(self.m)) / 2.0
    }
}

/// American option price.
///
/// Early exercise only pays for a call when the underlying yields or rates
/// are negative, and for a put when rates are positive or the underlying
/// has negative carry; otherwise the Black-Scholes value is returned. The
/// result never falls below intrinsic.
pub fn price(spec: &OptionContractSpec) -> f64 {
    let floor = intrinsic(spec.spot, spec.strike, spec.option_type);
    if spec.expiry_years <= EPSILON {
        return floor;
    }

    let value = match spec.option_type {
        OptionType::Call if spec.dividend_yield <= 0.0 && spec.rate >= 0.0 => {
            black_scholes::price(spec)
        }
        OptionType::Put if spec.rate <= 0.0 && spec.dividend_yield >= 0.0 => {
            black_scholes::price(spec)
        }
        OptionType::Call => call_price(spec),
        OptionType::Put => put_price(spec),
    };
    value.max(floor)
}

fn call_price(spec: &OptionContractSpec) -> f64 {
    let european = black_scholes::price(spec);
    let quad = Quadratic::new(spec);
    let q2 = quad.q2();
    if !q2.is_finite() || q2 <= 0.0 {
        return european.max(intrinsic(spec.spot, spec.strike, spec.option_type));
    }

    let s_star = match critical_call_price(spec, &quad) {
        Some(s) => s,
        None => return european.max(intrinsic(spec.spot, spec.strike, spec.option_type)),
    };

    if spec.spot >= s_star {
        return spec.spot - spec.strike;
    }

    let df_q = (-spec.dividend_yield * spec.expiry_years).exp();
    let a2 = (s_star / q2) * (1.0 - df_q * normal_cdf(d1_at(spec, s_star)));
    european + a2 * (spec.spot / s_star).powf(q2)
}

fn put_price(spec: &OptionContractSpec) -> f64 {
    let european = black_scholes::price(spec);
    let quad = Quadratic::new(spec);
    let q1 = quad.q1();
    if !q1.is_finite() || q1 >= 0.0 {
        return european.max(intrinsic(spec.spot, spec.strike, spec.option_type));
    }

    let s_star = match critical_put_price(spec, &quad) {
        Some(s) => s,
        None => return european.max(intrinsic(spec.spot, spec.strike, spec.option_type)),
    };

    if spec.spot <= s_star {
        return spec.strike - spec.spot;
    }

    let df_q = (-spec.dividend_yield * spec.expiry_years).exp();
    let a1 = -(s_star / q1) * (1.0 - df_q * normal_cdf(-d1_at(spec, s_star)));
    european + a1 * (spec.spot / s_star).powf(q1)
}

/// Newton iteration for the call boundary `S* − K = C(S*) + (1 − e^{−qT}N(d1))·S*/q2`.
fn critical_call_price(spec: &OptionContractSpec, quad: &Quadratic) -> Option<f64> {
    let k = spec.strike;
    let t = spec.expiry_years;
    let b = spec.rate - spec.dividend_yield;
    let vol_sqrt_t = spec.iv * t.sqrt();
    let df_q = (-spec.dividend_yield * t).exp();
    let q2 = quad.q2();

    let q2_inf = quad.q2_perpetual();
    let s_inf = k / (1.0 - 1.0 / q2_inf);
    let h2 = -(b * t + 2.0 * vol_sqrt_t) * k / (s_inf - k);
    let mut si = k + (s_inf - k) * (1.0 - h2.exp());

    for _ in 0..MAX_ITERATIONS {
        let d1 = d1_at(spec, si);
        let lhs = si - k;
        let rhs = black_scholes::price(&spec.with_spot(si)) + (1.0 - df_q * normal_cdf(d1)) * si / q2;
        if ((lhs - rhs) / k).abs() <= TOLERANCE {
            break;
        }
        let bi = df_q * normal_cdf(d1) * (1.0 - 1.0 / q2)
            + (1.0 - df_q * normal_pdf(d1) / vol_sqrt_t) / q2;
        si = (k + rhs - bi * si) / (1.0 - bi);
        if !si.is_finite() || si <= 0.0 {
            return None;
        }
    }

    Some(si)
}

/// Newton iteration for the put boundary `K − S* = P(S*) − (1 − e^{−qT}N(−d1))·S*/q1`.
fn critical_put_price(spec: &OptionContractSpec, quad: &Quadratic) -> Option<f64> {
    let k = spec.strike;
    let t = spec.expiry_years;
    let b = spec.rate - spec.dividend_yield;
    let vol_sqrt_t = spec.iv * t.sqrt();
    let df_q = (-spec.dividend_yield * t).exp();
    let q1 = quad.q1();

    let q1_inf = quad.q1_perpetual();
    let s_inf = k / (1.0 - 1.0 / q1_inf);
    let h1 = (b * t - 2.0 * vol_sqrt_t) * k / (k - s_inf);
    let mut si = s_inf + (k - s_inf) * h1.exp();

    for _ in 0..MAX_ITERATIONS {
        let d1 = d1_at(spec, si);
        let lhs = k - si;
        let rhs = black_scholes::price(&spec.with_spot(si)) - (1.0 - df_q * normal_cdf(-d1)) * si / q1;
        if ((lhs - rhs) / k).abs() <= TOLERANCE {
            break;
        }
        let bi = -df_q * normal_cdf(-d1) * (1.0 - 1.0 / q1)
            - (1.0 + df_q * normal_pdf(-d1) / vol_sqrt_t) / q1;
        si = (k - rhs + bi * si) / (1.0 + bi);
        if !si.is_finite() || si <= 0.0 {
            return None;
        }
    }

    Some(si)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_call_without_dividends_equals_european() {
        let spec = OptionContractSpec::call(100.0, 100.0, 1.0, 0.25, 0.05, 0.0);
        assert_eq!(price(&spec), black_scholes::price(&spec));
    }

    #[test]
    fn test_itm_put_carries_premium() {
        let spec = OptionContractSpec::put(90.0, 100.0, 1.0, 0.25, 0.05, 0.0);
        let american = price(&spec);
        let european = black_scholes::price(&spec);
        assert!(american > european);
        assert!(american >= spec.intrinsic());
    }

    #[test]
    fn test_put_close_to_binomial_tree() {
        let spec = OptionContractSpec::put(100.0, 100.0, 0.5, 0.25, 0.10, 0.0);
        let tree = crate::pricing::binomial::price(&spec, &[]);
        assert_abs_diff_eq!(price(&spec), tree, epsilon = 0.1);
    }

    #[test]
    fn test_deep_itm_put_exercises_immediately() {
        let spec = OptionContractSpec::put(40.0, 100.0, 1.0, 0.2, 0.08, 0.0);
        assert_abs_diff_eq!(price(&spec), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_put_at_zero_rate_is_european() {
        let spec = OptionContractSpec::put(90.0, 100.0, 1.0, 0.25, 0.0, 0.0);
        assert_eq!(price(&spec), black_scholes::price(&spec));
    }

    #[test]
    fn test_call_with_yield_at_least_european() {
        let spec = OptionContractSpec::call(110.0, 100.0, 1.0, 0.3, 0.03, 0.06);
        assert!(price(&spec) >= black_scholes::price(&spec));
        assert!(price(&spec) >= spec.intrinsic());
    }

    #[test]
    fn test_call_at_negative_rate_respects_intrinsic() {
        for t in [1.0, 0.0001] {
            let spec = OptionContractSpec::call(200.0, 100.0, t, 0.2, -0.02, 0.0);
            let value = price(&spec);
            assert!(value >= 100.0, "T={} price={}", t, value);
            assert!(value >= black_scholes::price(&spec));
        }
    }

    #[test]
    fn test_put_with_negative_yield_respects_intrinsic() {
        let spec = OptionContractSpec::put(50.0, 100.0, 1.0, 0.2, -0.01, -0.03);
        assert!(price(&spec) >= spec.intrinsic());
    }
}
