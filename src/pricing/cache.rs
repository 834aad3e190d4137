//! Bounded memoization of pricer results.

use crate::domain::option::sort_dividends;
use crate::domain::{DiscreteDividend, OptionContractSpec, PricingMethod, PricingResult};
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Deterministic fingerprint of every pricing-relevant input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PricingKey(String);

impl PricingKey {
    /// Dividends are sorted before hashing, so their input order never
    /// changes the key.
    pub fn new(
        spec: &OptionContractSpec,
        method: PricingMethod,
        crr_steps: Option<usize>,
        dividends: &[DiscreteDividend],
    ) -> Self {
        let mut hasher = Sha256::new();
        for x in [
            spec.spot,
            spec.strike,
            spec.expiry_years,
            spec.iv,
            spec.rate,
            spec.dividend_yield,
        ] {
            hasher.update(float_bytes(x));
        }
        hasher.update([spec.option_type.code() as u8]);
        hasher.update(method.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update((crr_steps.unwrap_or(0) as u64).to_le_bytes());

        let mut divs = dividends.to_vec();
        sort_dividends(&mut divs);
        hasher.update((divs.len() as u64).to_le_bytes());
        for div in &divs {
            hasher.update(float_bytes(div.time));
            hasher.update(float_bytes(div.amount));
        }

        PricingKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `-0.0` and `0.0` hash alike.
fn float_bytes(x: f64) -> [u8; 8] {
    (x + 0.0).to_bits().to_le_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedPricing {
    Price(f64),
    Full(PricingResult),
}

impl CachedPricing {
    pub fn price(&self) -> f64 {
        match self {
            CachedPricing::Price(p) => *p,
            CachedPricing::Full(r) => r.price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe LRU cache of pricing results.
pub struct PricingCache {
    entries: Mutex<LruCache<PricingKey, CachedPricing>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PricingCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        tracing::debug!(capacity = capacity.get(), "pricing cache created");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &PricingKey) -> Option<CachedPricing> {
        self.lookup(key, |_| true)
    }

    /// Full result only; a bare price entry counts as a miss.
    pub fn get_full(&self, key: &PricingKey) -> Option<PricingResult> {
        match self.lookup(key, |entry| matches!(entry, CachedPricing::Full(_))) {
            Some(CachedPricing::Full(result)) => Some(result),
            _ => None,
        }
    }

    fn lookup<F>(&self, key: &PricingKey, accept: F) -> Option<CachedPricing>
    where
        F: Fn(&CachedPricing) -> bool,
    {
        let found = self.entries.lock().get(key).copied().filter(|e| accept(e));
        match found {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key.as_str(), "pricing cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key.as_str(), "pricing cache miss");
            }
        }
        found
    }

    pub fn set(&self, key: PricingKey, value: CachedPricing) {
        self.entries.lock().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> OptionContractSpec {
        OptionContractSpec::put(100.0, 95.0, 0.5, 0.3, 0.04, 0.0)
    }

    fn div(time: f64, amount: f64) -> DiscreteDividend {
        DiscreteDividend { time, amount }
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_key_ignores_dividend_order() {
        let a = PricingKey::new(
            &spec(),
            PricingMethod::AmericanCrr,
            Some(500),
            &[div(0.1, 0.5), div(0.3, 0.5)],
        );
        let b = PricingKey::new(
            &spec(),
            PricingMethod::AmericanCrr,
            Some(500),
            &[div(0.3, 0.5), div(0.1, 0.5)],
        );
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_key_distinguishes_inputs() {
        let base = PricingKey::new(&spec(), PricingMethod::AmericanFast, None, &[]);
        let other_method = PricingKey::new(&spec(), PricingMethod::BlackScholes, None, &[]);
        let other_spot = PricingKey::new(&spec().with_spot(100.01), PricingMethod::AmericanFast, None, &[]);
        let call = OptionContractSpec { option_type: crate::domain::OptionType::Call, ..spec() };
        let other_type = PricingKey::new(&call, PricingMethod::AmericanFast, None, &[]);

        assert_ne!(base, other_method);
        assert_ne!(base, other_spot);
        assert_ne!(base, other_type);
    }

    #[test]
    fn test_negative_zero_rate_same_key() {
        let a = PricingKey::new(&spec().with_rate(0.0), PricingMethod::BlackScholes, None, &[]);
        let b = PricingKey::new(&spec().with_rate(-0.0), PricingMethod::BlackScholes, None, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let cache = PricingCache::new(capacity(4));
        let key = PricingKey::new(&spec(), PricingMethod::BlackScholes, None, &[]);

        assert!(cache.get(&key).is_none());
        cache.set(key.clone(), CachedPricing::Price(3.5));
        assert_eq!(cache.get(&key).map(|c| c.price()), Some(3.5));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_get_full_skips_price_entries() {
        let cache = PricingCache::new(capacity(4));
        let key = PricingKey::new(&spec(), PricingMethod::BlackScholes, None, &[]);

        cache.set(key.clone(), CachedPricing::Price(3.5));
        assert!(cache.get_full(&key).is_none());
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 1);

        let full = PricingResult {
            price: 3.5,
            delta: 0.4,
            ..Default::default()
        };
        cache.set(key.clone(), CachedPricing::Full(full));
        assert_eq!(cache.get_full(&key), Some(full));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_bounded_eviction() {
        let cache = PricingCache::new(capacity(2));
        let keys: Vec<PricingKey> = [90.0, 100.0, 110.0]
            .iter()
            .map(|s| PricingKey::new(&spec().with_spot(*s), PricingMethod::BlackScholes, None, &[]))
            .collect();
        for (i, key) in keys.iter().enumerate() {
            cache.set(key.clone(), CachedPricing::Price(i as f64));
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[0]).is_none());
        assert!(cache.get(&keys[2]).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = PricingCache::new(capacity(2));
        let key = PricingKey::new(&spec(), PricingMethod::BlackScholes, None, &[]);
        cache.set(key.clone(), CachedPricing::Price(1.0));
        cache.get(&key);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
