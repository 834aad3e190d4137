//! Instrument identity: raw descriptors in, canonical records out.

use super::{Decimal, InstrumentType, OptionType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Instrument-identifying fields of a broker execution.
///
/// Any subset may be present; the resolver decides what kind of instrument
/// the fields describe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentDescriptor {
    pub symbol: Option<String>,
    pub occ_symbol: Option<String>,
    pub futures_symbol: Option<String>,
    pub instrument_type: Option<InstrumentType>,
    pub underlying: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub strike: Option<Decimal>,
    pub right: Option<OptionType>,
    pub multiplier: Option<Decimal>,
    pub venue: Option<String>,
}

impl InstrumentDescriptor {
    pub fn equity(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            instrument_type: Some(InstrumentType::Equity),
            ..Default::default()
        }
    }

    pub fn occ(occ_symbol: &str) -> Self {
        Self {
            occ_symbol: Some(occ_symbol.to_string()),
            instrument_type: Some(InstrumentType::Option),
            ..Default::default()
        }
    }

    pub fn option(underlying: &str, expiry: NaiveDate, strike: Decimal, right: OptionType) -> Self {
        Self {
            underlying: Some(underlying.to_string()),
            expiry: Some(expiry),
            strike: Some(strike),
            right: Some(right),
            instrument_type: Some(InstrumentType::Option),
            ..Default::default()
        }
    }

    pub fn future(futures_symbol: &str) -> Self {
        Self {
            futures_symbol: Some(futures_symbol.to_string()),
            instrument_type: Some(InstrumentType::Future),
            ..Default::default()
        }
    }

    pub fn with_multiplier(mut self, multiplier: Decimal) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    pub fn with_venue(mut self, venue: &str) -> Self {
        self.venue = Some(venue.to_string());
        self
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }

    /// Instrument kind implied by the fields: explicit type first, then OCC
    /// symbol, then futures symbol, else equity.
    pub fn inferred_type(&self) -> InstrumentType {
        if let Some(t) = self.instrument_type {
            t
        } else if self.occ_symbol.is_some() {
            InstrumentType::Option
        } else if self.futures_symbol.is_some() {
            InstrumentType::Future
        } else {
            InstrumentType::Equity
        }
    }
}

/// Durable instrument identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub Uuid);

impl InstrumentId {
    pub fn new() -> Self {
        InstrumentId(Uuid::new_v4())
    }
}

impl Default for InstrumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-specific instrument metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InstrumentMeta {
    Equity {
        exchange: String,
        description: String,
    },
    Option {
        underlying: String,
        expiry: NaiveDate,
        strike: Decimal,
        right: OptionType,
        /// Set once the contract multiplier deviates from the standard 100.
        adjusted: bool,
    },
    Future {
        root: String,
        month_code: char,
        year_code: String,
        expiry: NaiveDate,
        tick_value: Decimal,
        description: String,
        exchange: String,
    },
}

impl InstrumentMeta {
    pub fn instrument_type(&self) -> InstrumentType {
        match self {
            InstrumentMeta::Equity { .. } => InstrumentType::Equity,
            InstrumentMeta::Option { .. } => InstrumentType::Option,
            InstrumentMeta::Future { .. } => InstrumentType::Future,
        }
    }

    pub fn mark_adjusted(&mut self) {
        if let InstrumentMeta::Option { adjusted, .. } = self {
            *adjusted = true;
        }
    }
}

/// Canonical instrument produced from a descriptor, before it has an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInstrument {
    /// e.g. `EQ:AAPL`, `OPT:SPY240216C00450000`, `FUT:ESZ5`.
    pub unique_symbol: String,
    pub instrument_type: InstrumentType,
    pub multiplier: Decimal,
    /// Whether the multiplier came from the execution rather than a default.
    pub explicit_multiplier: bool,
    pub meta: InstrumentMeta,
    /// Raw spelling to record as an alias.
    pub alias: String,
}

/// Canonical instrument record with durable identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInstrument {
    pub instrument_id: InstrumentId,
    pub unique_symbol: String,
    pub instrument_type: InstrumentType,
    pub multiplier: Decimal,
    pub meta: InstrumentMeta,
}

impl ResolvedInstrument {
    pub fn from_normalized(id: InstrumentId, normalized: &NormalizedInstrument) -> Self {
        Self {
            instrument_id: id,
            unique_symbol: normalized.unique_symbol.clone(),
            instrument_type: normalized.instrument_type,
            multiplier: normalized.multiplier,
            meta: normalized.meta.clone(),
        }
    }
}
