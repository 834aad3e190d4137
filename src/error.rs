use crate::config::ConfigError;
use crate::engine::MatchError;
use crate::instruments::{ResolveError, StoreError, SymbolError};
use crate::marketdata::MarketDataError;
use crate::orchestration::{JournalError, QuoteError};
use crate::pricing::PricingError;
use thiserror::Error;

/// Top-level error for callers that drive several subsystems.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),
    #[error("Symbol error: {0}")]
    Symbol(#[from] SymbolError),
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Match error: {0}")]
    Match(#[from] MatchError),
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl From<JournalError> for AppError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Resolve(e) => AppError::Resolve(e),
            JournalError::Match(e) => AppError::Match(e),
            JournalError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::Symbol(e) => AppError::Symbol(e),
            QuoteError::MarketData(e) => AppError::MarketData(e),
            QuoteError::Pricing(e) => AppError::Pricing(e),
        }
    }
}
