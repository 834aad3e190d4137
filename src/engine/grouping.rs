//! Partition executions into matching groups.
//!
//! Equities and futures group by canonical symbol; options group by
//! underlying and expiry so multi-leg strategies match as one position.
//! Groups are keyed per account and come out in first-seen order.

use super::MatchError;
use crate::domain::{
    Execution, ExecutionOrderingKey, InstrumentMeta, InstrumentType, NormalizedInstrument,
};
use crate::instruments::{normalize, FuturesCalendar};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub account: Option<String>,
    /// Canonical symbol, or `UNDERLYING:YYYY-MM-DD` for options.
    pub instrument_key: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account {
            Some(account) => write!(f, "{} ({})", self.instrument_key, account),
            None => f.write_str(&self.instrument_key),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupedExecution<'a> {
    /// Position in the input batch.
    pub index: usize,
    pub execution: &'a Execution,
    pub instrument: NormalizedInstrument,
}

#[derive(Debug, Clone)]
pub struct ExecutionGroup<'a> {
    pub key: GroupKey,
    pub instrument_type: InstrumentType,
    /// Display symbol: ticker, futures code or option underlying.
    pub symbol: String,
    /// Set for option groups.
    pub expiry: Option<NaiveDate>,
    /// Sorted by timestamp, ties in input order.
    pub executions: Vec<GroupedExecution<'a>>,
}

/// Reject executions the matcher cannot account for.
pub fn validate_execution(exec: &Execution) -> Result<(), MatchError> {
    let invalid = |reason: &str| MatchError::InvalidExecution {
        exec_id: exec.exec_id.clone(),
        reason: reason.to_string(),
    };

    if exec.exec_id.trim().is_empty() {
        return Err(invalid("missing exec_id"));
    }
    if !exec.quantity.is_positive() {
        return Err(invalid("quantity must be positive"));
    }
    if exec.price.is_negative() {
        return Err(invalid("price must not be negative"));
    }
    if exec.fees.is_negative() {
        return Err(invalid("fees must not be negative"));
    }
    Ok(())
}

fn strip_prefix(unique_symbol: &str) -> &str {
    unique_symbol
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(unique_symbol)
}

/// Key, display symbol and expiry for the group an instrument belongs to.
fn group_identity(instrument: &NormalizedInstrument) -> (String, String, Option<NaiveDate>) {
    match &instrument.meta {
        InstrumentMeta::Option {
            underlying, expiry, ..
        } => (
            format!("{}:{}", underlying, expiry.format("%Y-%m-%d")),
            underlying.clone(),
            Some(*expiry),
        ),
        InstrumentMeta::Equity { .. } | InstrumentMeta::Future { .. } => (
            instrument.unique_symbol.clone(),
            strip_prefix(&instrument.unique_symbol).to_string(),
            None,
        ),
    }
}

/// Validate, normalize and group a batch of executions.
pub fn group_executions<'a>(
    executions: &'a [Execution],
    calendar: &FuturesCalendar,
) -> Result<Vec<ExecutionGroup<'a>>, MatchError> {
    let mut groups: Vec<ExecutionGroup<'a>> = Vec::new();
    let mut positions: HashMap<GroupKey, usize> = HashMap::new();

    for (index, execution) in executions.iter().enumerate() {
        validate_execution(execution)?;
        let instrument = normalize(&execution.instrument, calendar)?;
        let (instrument_key, symbol, expiry) = group_identity(&instrument);
        let key = GroupKey {
            account: execution.account.clone(),
            instrument_key,
        };

        let slot = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push(ExecutionGroup {
                key,
                instrument_type: instrument.instrument_type,
                symbol,
                expiry,
                executions: Vec::new(),
            });
            groups.len() - 1
        });

        groups[slot].executions.push(GroupedExecution {
            index,
            execution,
            instrument,
        });
    }

    for group in &mut groups {
        group
            .executions
            .sort_by_key(|g| ExecutionOrderingKey::new(g.execution, g.index));
    }

    Ok(groups)
}
