//! Matching output: round-trip trades and strategy legs.

use super::{Decimal, InstrumentId, InstrumentType, OptionType, Side, TimeMs};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    /// Opened, nothing closed yet.
    Open,
    /// Some quantity closed, some still open.
    Partial,
    /// Back to flat.
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Partial => "partial",
            TradeStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TradeStatus::Open),
            "partial" => Ok(TradeStatus::Partial),
            "closed" => Ok(TradeStatus::Closed),
            other => Err(format!("unknown trade status: {}", other)),
        }
    }
}

/// How a closed trade reached flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Closed by offsetting executions.
    Executions,
    /// Option contracts left open past expiry, closed at zero.
    Expired,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Executions => "executions",
            CloseReason::Expired => "expired",
        }
    }
}

/// One constituent of a multi-leg option trade, aggregated over fills with
/// the same strike, right and side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub side: Side,
    pub right: OptionType,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub quantity: Decimal,
    /// Quantity-weighted average fill price.
    pub avg_price: Decimal,
    pub fill_count: u32,
}

/// A reconstructed round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// `<group symbol>-<first exec id>`; stable across re-imports.
    pub group_key: String,
    pub account: Option<String>,
    /// Canonical symbol for equities/futures, `UNDERLYING:YYYY-MM-DD` for option groups.
    pub instrument_key: String,
    /// Durable instrument identity, when the trade maps to a single instrument.
    pub instrument_id: Option<InstrumentId>,
    pub instrument_type: InstrumentType,
    /// Display symbol (ticker, futures code or underlying).
    pub symbol: String,
    /// Direction of the opening execution.
    pub side: Side,
    pub status: TradeStatus,
    pub opened_at: TimeMs,
    pub closed_at: Option<TimeMs>,
    pub qty_opened: Decimal,
    pub qty_closed: Decimal,
    pub avg_open_price: Decimal,
    /// `None` while no quantity has closed.
    pub avg_close_price: Option<Decimal>,
    /// Net of fees; `Some` only when `status == Closed`.
    pub realized_pnl: Option<Decimal>,
    pub fees: Decimal,
    pub multiplier: Decimal,
    /// Empty for single-instrument trades.
    pub legs: Vec<Leg>,
    pub close_reason: Option<CloseReason>,
    pub exec_ids: Vec<String>,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    pub fn open_quantity(&self) -> Decimal {
        self.qty_opened - self.qty_closed
    }
}
