//! Domain types for the trade journal core.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, Side, OptionType, InstrumentType
//! - Execution, instrument and trade records
//! - Option pricing inputs and outputs
//! - Stable execution ordering for deterministic matching

pub mod decimal;
pub mod execution;
pub mod instrument;
pub mod option;
pub mod ordering;
pub mod primitives;
pub mod trade;

pub use decimal::Decimal;
pub use execution::{Execution, PositionEffect};
pub use instrument::{
    InstrumentDescriptor, InstrumentId, InstrumentMeta, NormalizedInstrument, ResolvedInstrument,
};
pub use option::{
    DiscreteDividend, Dividend, DividendSchedule, OptionContractSpec, PricingMethod, PricingResult,
};
pub use ordering::ExecutionOrderingKey;
pub use primitives::{InstrumentType, OptionType, Side, TimeMs};
pub use trade::{CloseReason, Leg, Trade, TradeStatus};
