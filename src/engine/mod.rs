//! Execution matching: broker fills in, round-trip trades out.

use crate::domain::{Decimal, Execution, Trade};
use crate::instruments::{FuturesCalendar, ResolveError};
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod grouping;
pub mod matcher;
pub mod position_tracker;

pub use grouping::{group_executions, validate_execution, ExecutionGroup, GroupKey};
pub use matcher::Matcher;
pub use position_tracker::{Effect, EffectType, Lot, PositionState, PositionTracker};

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid execution {exec_id}: {reason}")]
    InvalidExecution { exec_id: String, reason: String },
    #[error("Execution {exec_id} in {group} exceeds the open position by {excess}")]
    UnmatchedQuantity {
        group: String,
        excess: Decimal,
        exec_id: String,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// What to do with a fill that takes a position through flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipPolicy {
    /// Treat the excess as an error.
    #[default]
    Reject,
    /// Close to flat and open the remainder as a new trade.
    Split,
}

impl FlipPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlipPolicy::Reject => "reject",
            FlipPolicy::Split => "split",
        }
    }
}

impl fmt::Display for FlipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlipPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(FlipPolicy::Reject),
            "split" => Ok(FlipPolicy::Split),
            other => Err(format!("unknown flip policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchConfig {
    pub flip_policy: FlipPolicy,
    /// Valuation date; option groups that expired before it are closed at zero.
    pub as_of: Option<NaiveDate>,
    pub calendar: FuturesCalendar,
}

impl MatchConfig {
    pub fn with_flip_policy(mut self, flip_policy: FlipPolicy) -> Self {
        self.flip_policy = flip_policy;
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn with_calendar(mut self, calendar: FuturesCalendar) -> Self {
        self.calendar = calendar;
        self
    }
}

/// Rebuild trades from executions using descriptor-derived multipliers.
pub fn match_executions(
    executions: &[Execution],
    config: &MatchConfig,
) -> Result<Vec<Trade>, MatchError> {
    Matcher::new(config.clone()).match_executions(executions)
}
