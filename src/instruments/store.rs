//! Persistence boundary for canonical instruments.

use crate::domain::{Decimal, InstrumentId, InstrumentMeta, NormalizedInstrument, ResolvedInstrument};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt instrument record: {0}")]
    Corrupt(String),
}

/// Instrument storage used by the resolver.
///
/// `create_instrument` must be an atomic insert-if-absent: under a race the
/// loser gets the winner's record back, never a duplicate.
#[async_trait]
pub trait InstrumentStore: Send + Sync {
    async fn find_instrument_by_symbol(
        &self,
        unique_symbol: &str,
    ) -> Result<Option<ResolvedInstrument>, StoreError>;

    async fn create_instrument(
        &self,
        instrument: &NormalizedInstrument,
    ) -> Result<ResolvedInstrument, StoreError>;

    async fn update_instrument_multiplier(
        &self,
        id: InstrumentId,
        multiplier: Decimal,
        meta: &InstrumentMeta,
    ) -> Result<(), StoreError>;

    /// Idempotent.
    async fn insert_alias(
        &self,
        id: InstrumentId,
        source: &str,
        alias: &str,
    ) -> Result<(), StoreError>;

    async fn find_instrument_by_alias(
        &self,
        source: &str,
        alias: &str,
    ) -> Result<Option<ResolvedInstrument>, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    by_symbol: HashMap<String, ResolvedInstrument>,
    symbol_by_id: HashMap<InstrumentId, String>,
    aliases: HashMap<(String, String), InstrumentId>,
}

/// Process-local store, used when no database is configured.
#[derive(Default)]
pub struct MemoryInstrumentStore {
    state: Mutex<MemoryState>,
}

impl MemoryInstrumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instrument_count(&self) -> usize {
        self.state.lock().by_symbol.len()
    }

    pub fn alias_count(&self) -> usize {
        self.state.lock().aliases.len()
    }
}

#[async_trait]
impl InstrumentStore for MemoryInstrumentStore {
    async fn find_instrument_by_symbol(
        &self,
        unique_symbol: &str,
    ) -> Result<Option<ResolvedInstrument>, StoreError> {
        Ok(self.state.lock().by_symbol.get(unique_symbol).cloned())
    }

    async fn create_instrument(
        &self,
        instrument: &NormalizedInstrument,
    ) -> Result<ResolvedInstrument, StoreError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.by_symbol.get(&instrument.unique_symbol) {
            return Ok(existing.clone());
        }

        let record = ResolvedInstrument::from_normalized(InstrumentId::new(), instrument);
        tracing::info!(
            unique_symbol = %record.unique_symbol,
            instrument_id = %record.instrument_id,
            "Created instrument"
        );
        state
            .symbol_by_id
            .insert(record.instrument_id, record.unique_symbol.clone());
        state
            .by_symbol
            .insert(record.unique_symbol.clone(), record.clone());
        Ok(record)
    }

    async fn update_instrument_multiplier(
        &self,
        id: InstrumentId,
        multiplier: Decimal,
        meta: &InstrumentMeta,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let symbol = state
            .symbol_by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt(format!("unknown instrument id {}", id)))?;
        if let Some(record) = state.by_symbol.get_mut(&symbol) {
            record.multiplier = multiplier;
            record.meta = meta.clone();
        }
        Ok(())
    }

    async fn insert_alias(
        &self,
        id: InstrumentId,
        source: &str,
        alias: &str,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .aliases
            .entry((source.to_string(), alias.to_string()))
            .or_insert(id);
        Ok(())
    }

    async fn find_instrument_by_alias(
        &self,
        source: &str,
        alias: &str,
    ) -> Result<Option<ResolvedInstrument>, StoreError> {
        let state = self.state.lock();
        let found = state
            .aliases
            .get(&(source.to_string(), alias.to_string()))
            .and_then(|id| state.symbol_by_id.get(id))
            .and_then(|symbol| state.by_symbol.get(symbol))
            .cloned();
        Ok(found)
    }
}
