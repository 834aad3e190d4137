//! Instrument resolution: raw broker spellings to canonical instruments with
//! durable identity.

pub mod equity;
pub mod futures;
pub mod occ;
pub mod store;

pub use futures::{FuturesCalendar, FuturesSpec, FuturesSymbol};
pub use occ::{build_occ_symbol, parse_occ_symbol, OccSymbol};
pub use store::{InstrumentStore, MemoryInstrumentStore, StoreError};

use crate::domain::{
    Decimal, InstrumentDescriptor, InstrumentMeta, InstrumentType, NormalizedInstrument,
    ResolvedInstrument,
};
use std::sync::Arc;
use thiserror::Error;

/// Standard equity option contract size.
pub const STANDARD_OPTION_MULTIPLIER: i64 = 100;
/// Alias source recorded for broker spellings.
pub const DEFAULT_ALIAS_SOURCE: &str = "broker";

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("Unrecognized {kind} symbol: {symbol}")]
    UnknownFormat { kind: &'static str, symbol: String },
    #[error("Unknown futures root: {0}")]
    UnknownFuturesRoot(String),
    #[error("Strike {0} cannot be encoded in an OCC symbol")]
    StrikeOutOfRange(Decimal),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unsupported instrument: {0}")]
    UnsupportedInstrument(String),
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Canonicalize a descriptor without touching storage.
pub fn normalize(
    descriptor: &InstrumentDescriptor,
    calendar: &FuturesCalendar,
) -> Result<NormalizedInstrument, ResolveError> {
    match descriptor.inferred_type() {
        InstrumentType::Equity => normalize_equity(descriptor),
        InstrumentType::Option => normalize_option(descriptor),
        InstrumentType::Future => normalize_future(descriptor, calendar),
    }
}

fn normalize_equity(descriptor: &InstrumentDescriptor) -> Result<NormalizedInstrument, ResolveError> {
    let raw = non_empty(descriptor.symbol.as_ref()).ok_or_else(|| {
        ResolveError::UnsupportedInstrument("equity requires a symbol".to_string())
    })?;
    let symbol = equity::normalize_equity_symbol(raw);
    let exchange = non_empty(descriptor.venue.as_ref())
        .map(|v| v.to_ascii_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    Ok(NormalizedInstrument {
        unique_symbol: equity::equity_unique_symbol(&symbol),
        instrument_type: InstrumentType::Equity,
        multiplier: Decimal::one(),
        explicit_multiplier: false,
        meta: InstrumentMeta::Equity {
            exchange,
            description: format!("{} Stock", symbol),
        },
        alias: raw.to_string(),
    })
}

fn normalize_option(descriptor: &InstrumentDescriptor) -> Result<NormalizedInstrument, ResolveError> {
    let (parsed, raw) = if let Some(raw) = non_empty(descriptor.occ_symbol.as_ref()) {
        (occ::parse_occ_symbol(&raw.to_ascii_uppercase())?, raw.to_string())
    } else {
        let missing = || {
            ResolveError::UnsupportedInstrument(
                "option requires an OCC symbol or underlying, expiry, strike and right".to_string(),
            )
        };
        let underlying = non_empty(descriptor.underlying.as_ref()).ok_or_else(missing)?;
        let expiry = descriptor.expiry.ok_or_else(missing)?;
        let strike = descriptor.strike.ok_or_else(missing)?;
        let right = descriptor.right.ok_or_else(missing)?;
        let built = occ::build_occ_symbol(underlying, expiry, right, strike)?;
        let parsed = occ::parse_occ_symbol(&built)?;
        let raw = non_empty(descriptor.symbol.as_ref())
            .map(str::to_string)
            .unwrap_or(built);
        (parsed, raw)
    };

    let standard = Decimal::from_i64(STANDARD_OPTION_MULTIPLIER);
    let multiplier = descriptor.multiplier.unwrap_or(standard);
    if !multiplier.is_positive() {
        return Err(ResolveError::UnsupportedInstrument(format!(
            "option multiplier must be positive, got {}",
            multiplier
        )));
    }

    Ok(NormalizedInstrument {
        unique_symbol: occ::option_unique_symbol(&parsed.to_string()),
        instrument_type: InstrumentType::Option,
        multiplier,
        explicit_multiplier: descriptor.multiplier.is_some(),
        meta: InstrumentMeta::Option {
            underlying: parsed.root,
            expiry: parsed.expiry,
            strike: parsed.strike,
            right: parsed.right,
            adjusted: multiplier != standard,
        },
        alias: raw,
    })
}

fn normalize_future(
    descriptor: &InstrumentDescriptor,
    calendar: &FuturesCalendar,
) -> Result<NormalizedInstrument, ResolveError> {
    let raw = non_empty(descriptor.futures_symbol.as_ref())
        .or_else(|| non_empty(descriptor.symbol.as_ref()))
        .ok_or_else(|| {
            ResolveError::UnsupportedInstrument("future requires a futures symbol".to_string())
        })?;
    let parsed = futures::parse_futures_symbol(&raw.to_ascii_uppercase(), calendar)?;
    let spec = futures::futures_spec(&parsed.root)
        .ok_or_else(|| SymbolError::UnknownFuturesRoot(parsed.root.clone()))?;

    Ok(NormalizedInstrument {
        unique_symbol: futures::futures_unique_symbol(&parsed),
        instrument_type: InstrumentType::Future,
        multiplier: spec.multiplier,
        explicit_multiplier: false,
        meta: InstrumentMeta::Future {
            root: parsed.root,
            month_code: parsed.month_code,
            year_code: parsed.year_code,
            expiry: parsed.expiry,
            tick_value: spec.tick_value,
            description: spec.description.to_string(),
            exchange: futures::FUTURES_EXCHANGE.to_string(),
        },
        alias: raw.to_string(),
    })
}

/// Normalizes descriptors and gives them durable identity through an
/// [`InstrumentStore`]. Safe to call concurrently for the same symbol.
pub struct InstrumentResolver {
    store: Arc<dyn InstrumentStore>,
    calendar: FuturesCalendar,
    alias_source: String,
}

impl InstrumentResolver {
    pub fn new(store: Arc<dyn InstrumentStore>, calendar: FuturesCalendar) -> Self {
        Self {
            store,
            calendar,
            alias_source: DEFAULT_ALIAS_SOURCE.to_string(),
        }
    }

    pub fn with_alias_source(mut self, source: &str) -> Self {
        self.alias_source = source.to_string();
        self
    }

    pub fn calendar(&self) -> &FuturesCalendar {
        &self.calendar
    }

    pub fn normalize(&self, descriptor: &InstrumentDescriptor) -> Result<NormalizedInstrument, ResolveError> {
        normalize(descriptor, &self.calendar)
    }

    pub async fn resolve(&self, descriptor: &InstrumentDescriptor) -> Result<ResolvedInstrument, ResolveError> {
        let normalized = self.normalize(descriptor)?;

        let mut instrument = match self
            .store
            .find_instrument_by_symbol(&normalized.unique_symbol)
            .await?
        {
            Some(existing) => existing,
            None => self.store.create_instrument(&normalized).await?,
        };

        if normalized.instrument_type == InstrumentType::Option
            && normalized.explicit_multiplier
            && instrument.multiplier != normalized.multiplier
        {
            tracing::warn!(
                unique_symbol = %instrument.unique_symbol,
                old = %instrument.multiplier,
                new = %normalized.multiplier,
                "Option multiplier adjusted"
            );
            instrument.multiplier = normalized.multiplier;
            instrument.meta.mark_adjusted();
            self.store
                .update_instrument_multiplier(
                    instrument.instrument_id,
                    instrument.multiplier,
                    &instrument.meta,
                )
                .await?;
        }

        self.store
            .insert_alias(instrument.instrument_id, &self.alias_source, &normalized.alias)
            .await?;
        tracing::debug!(
            alias = %normalized.alias,
            unique_symbol = %instrument.unique_symbol,
            "Recorded instrument alias"
        );

        Ok(instrument)
    }

    /// Canonical instrument previously resolved from `raw`.
    pub async fn lookup_alias(&self, raw: &str) -> Result<Option<ResolvedInstrument>, ResolveError> {
        Ok(self
            .store
            .find_instrument_by_alias(&self.alias_source, raw.trim())
            .await?)
    }
}
