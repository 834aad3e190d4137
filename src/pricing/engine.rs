//! Cached pricing front end.

use super::cache::{CacheStats, CachedPricing, PricingCache, PricingKey};
use super::{
    check_method, ensure_finite, evaluate, sensitivities, tree_steps, validate, validate_dividends, PricingError,
};
use crate::domain::{DiscreteDividend, OptionContractSpec, PricingMethod, PricingResult};
use std::num::NonZeroUsize;

/// One quote to price.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRequest {
    pub spec: OptionContractSpec,
    pub method: PricingMethod,
    /// Upcoming discrete dividends (year offsets); only the tree uses them.
    pub dividends: Vec<DiscreteDividend>,
}

impl PricingRequest {
    pub fn new(spec: OptionContractSpec, method: PricingMethod) -> Self {
        Self {
            spec,
            method,
            dividends: Vec::new(),
        }
    }

    pub fn with_dividends(mut self, dividends: Vec<DiscreteDividend>) -> Self {
        self.dividends = dividends;
        self
    }
}

/// Pricer with its own bounded cache. Every tree evaluation made while
/// computing Greeks goes through the cache too, so repeated quotes skip the
/// rebuilds.
pub struct PricingEngine {
    cache: PricingCache,
}

impl PricingEngine {
    pub fn new(cache_capacity: NonZeroUsize) -> Self {
        Self {
            cache: PricingCache::new(cache_capacity),
        }
    }

    pub fn price(&self, request: &PricingRequest) -> Result<f64, PricingError> {
        validate(&request.spec)?;
        validate_dividends(&request.dividends)?;
        let steps = tree_steps(request.method, request.spec.expiry_years);
        self.cached_price(&request.spec, request.method, &request.dividends, steps)
    }

    pub fn greeks(&self, request: &PricingRequest) -> Result<PricingResult, PricingError> {
        validate(&request.spec)?;
        validate_dividends(&request.dividends)?;

        let method = request.method;
        let steps = tree_steps(method, request.spec.expiry_years);
        let key = PricingKey::new(&request.spec, method, steps, &request.dividends);
        if let Some(result) = self.cache.get_full(&key) {
            return Ok(result);
        }

        check_method(&request.spec, method, steps)?;
        let result = sensitivities(&request.spec, method, |s| {
            self.cached_price(s, method, &request.dividends, steps)
                .unwrap_or(f64::NAN)
        });
        let result = ensure_finite(result, method)?;
        self.cache.set(key, CachedPricing::Full(result));
        Ok(result)
    }

    fn cached_price(
        &self,
        spec: &OptionContractSpec,
        method: PricingMethod,
        dividends: &[DiscreteDividend],
        steps: Option<usize>,
    ) -> Result<f64, PricingError> {
        let key = PricingKey::new(spec, method, steps, dividends);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.price());
        }
        let value = evaluate(spec, method, dividends, steps)?;
        self.cache.set(key, CachedPricing::Price(value));
        Ok(value)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
