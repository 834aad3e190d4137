use crate::domain::PricingMethod;
use crate::engine::{FlipPolicy, MatchConfig};
use crate::instruments::FuturesCalendar;
use crate::marketdata::polygon::DEFAULT_BASE_URL;
use crate::marketdata::PolygonClient;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use thiserror::Error;

const DEFAULT_CACHE_CAPACITY: usize = 4096;
const DEFAULT_RISK_FREE_RATE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file; without one, instruments live in memory and trades are not persisted.
    pub database_path: Option<String>,
    pub polygon_api_key: Option<String>,
    pub polygon_base_url: String,
    pub pricing_method: PricingMethod,
    pub pricing_cache_capacity: NonZeroUsize,
    pub futures_year_epoch: i32,
    pub flip_policy: FlipPolicy,
    pub risk_free_rate: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn non_empty(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = non_empty(&env_map, "DATABASE_PATH");
        let polygon_api_key = non_empty(&env_map, "POLYGON_API_KEY");

        let polygon_base_url = match env_map.get("POLYGON_BASE_URL") {
            None => DEFAULT_BASE_URL.to_string(),
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::InvalidValue(
                    "POLYGON_BASE_URL".to_string(),
                    "must not be empty".to_string(),
                ))
            }
            Some(url) => url.trim().to_string(),
        };

        let pricing_method = env_map
            .get("PRICING_METHOD")
            .map(|s| s.as_str())
            .unwrap_or("american-fast")
            .parse::<PricingMethod>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "PRICING_METHOD".to_string(),
                    "must be bs, american-crr, or american-fast".to_string(),
                )
            })?;

        let pricing_cache_capacity = match env_map.get("PRICING_CACHE_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(NonZeroUsize::new)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "PRICING_CACHE_CAPACITY".to_string(),
                        "must be a positive integer".to_string(),
                    )
                })?,
            None => NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        };

        let futures_year_epoch = env_map
            .get("FUTURES_YEAR_EPOCH")
            .map(|s| s.trim())
            .unwrap_or("2020")
            .parse::<i32>()
            .ok()
            .filter(|y| (1900..=2990).contains(y) && y % 10 == 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "FUTURES_YEAR_EPOCH".to_string(),
                    "must be a decade-aligned year between 1900 and 2990".to_string(),
                )
            })?;

        let flip_policy = match env_map.get("MATCH_FLIP_POLICY") {
            Some(raw) => raw.parse::<FlipPolicy>().map_err(|_| {
                ConfigError::InvalidValue(
                    "MATCH_FLIP_POLICY".to_string(),
                    format!("must be reject or split, got {}", raw),
                )
            })?,
            None => FlipPolicy::default(),
        };

        let risk_free_rate = match env_map.get("RISK_FREE_RATE") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite())
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "RISK_FREE_RATE".to_string(),
                        "must be a finite number".to_string(),
                    )
                })?,
            None => DEFAULT_RISK_FREE_RATE,
        };

        Ok(Config {
            database_path,
            polygon_api_key,
            polygon_base_url,
            pricing_method,
            pricing_cache_capacity,
            futures_year_epoch,
            flip_policy,
            risk_free_rate,
        })
    }

    pub fn futures_calendar(&self) -> FuturesCalendar {
        FuturesCalendar::new(self.futures_year_epoch)
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig::default()
            .with_flip_policy(self.flip_policy)
            .with_calendar(self.futures_calendar())
    }

    pub fn polygon_client(&self) -> Result<PolygonClient, ConfigError> {
        let api_key = self
            .polygon_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnv("POLYGON_API_KEY".to_string()))?;
        PolygonClient::new(api_key, &self.polygon_base_url).map_err(|e| {
            ConfigError::InvalidValue("POLYGON_API_KEY".to_string(), e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(HashMap::new()).unwrap();
        assert_eq!(config.database_path, None);
        assert_eq!(config.polygon_api_key, None);
        assert_eq!(config.polygon_base_url, "https://api.polygon.io");
        assert_eq!(config.pricing_method, PricingMethod::AmericanFast);
        assert_eq!(config.pricing_cache_capacity.get(), 4096);
        assert_eq!(config.futures_year_epoch, 2020);
        assert_eq!(config.flip_policy, FlipPolicy::Reject);
        assert_eq!(config.risk_free_rate, 0.05);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_env_map(env(&[
            ("DATABASE_PATH", "/tmp/journal.db"),
            ("POLYGON_API_KEY", "key"),
            ("PRICING_METHOD", "american-crr"),
            ("PRICING_CACHE_CAPACITY", "16"),
            ("FUTURES_YEAR_EPOCH", "2030"),
            ("MATCH_FLIP_POLICY", "split"),
            ("RISK_FREE_RATE", "0.0425"),
        ]))
        .unwrap();
        assert_eq!(config.database_path.as_deref(), Some("/tmp/journal.db"));
        assert_eq!(config.pricing_method, PricingMethod::AmericanCrr);
        assert_eq!(config.pricing_cache_capacity.get(), 16);
        assert_eq!(config.futures_calendar().year_for("5"), Some(2035));
        assert_eq!(config.match_config().flip_policy, FlipPolicy::Split);
        assert_eq!(config.risk_free_rate, 0.0425);
    }

    #[test]
    fn test_polygon_client_requires_key() {
        let config = Config::from_env_map(HashMap::new()).unwrap();
        match config.polygon_client() {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "POLYGON_API_KEY"),
            _ => panic!("Expected MissingEnv error"),
        }

        let config = Config::from_env_map(env(&[("POLYGON_API_KEY", "key")])).unwrap();
        assert!(config.polygon_client().is_ok());
    }

    #[test]
    fn test_invalid_pricing_method() {
        let result = Config::from_env_map(env(&[("PRICING_METHOD", "monte-carlo")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PRICING_METHOD"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_cache_capacity() {
        let result = Config::from_env_map(env(&[("PRICING_CACHE_CAPACITY", "0")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PRICING_CACHE_CAPACITY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_futures_epoch() {
        let result = Config::from_env_map(env(&[("FUTURES_YEAR_EPOCH", "2025")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "FUTURES_YEAR_EPOCH"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_flip_policy() {
        let result = Config::from_env_map(env(&[("MATCH_FLIP_POLICY", "merge")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MATCH_FLIP_POLICY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = Config::from_env_map(env(&[("POLYGON_BASE_URL", " ")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "POLYGON_BASE_URL"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_non_finite_rate_rejected() {
        let result = Config::from_env_map(env(&[("RISK_FREE_RATE", "NaN")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "RISK_FREE_RATE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
