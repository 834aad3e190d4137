//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain:
//! - `instruments.rs` - canonical instruments and aliases (`InstrumentStore`)
//! - `trades.rs` - reconstructed trades

mod instruments;
mod trades;

use crate::domain::Decimal;
use crate::instruments::StoreError;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Decimal column decoding; bad text is logged and read as zero.
fn parse_decimal_column(column: &str, key: &str, raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        warn!(
            key = %key,
            column = %column,
            value = %raw,
            error = %e,
            "Failed to parse decimal column, using default"
        );
        Decimal::default()
    })
}

/// Enum-like column decoding; bad text is a corrupt row.
fn parse_column<T: FromStr>(column: &str, key: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse::<T>().map_err(|_| {
        StoreError::Corrupt(format!("{}: invalid {} value {:?}", key, column, raw))
    })
}
