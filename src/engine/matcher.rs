//! Round-trip reconstruction over grouped executions.
//!
//! Each group keeps one FIFO lot book per contract. A trade starts when the
//! group leaves flat and ends when every contract in it is flat again.

use super::grouping::{group_executions, ExecutionGroup, GroupedExecution};
use super::position_tracker::{Effect, EffectType, PositionTracker};
use super::{FlipPolicy, MatchConfig, MatchError};
use crate::domain::{
    CloseReason, Decimal, Execution, InstrumentId, InstrumentMeta, InstrumentType, Leg,
    NormalizedInstrument, OptionType, PositionEffect, ResolvedInstrument, Side, TimeMs, Trade,
    TradeStatus,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

const MS_PER_DAY: i64 = 86_400_000;

/// Last millisecond of the expiry date, UTC.
fn expiry_close_time(expiry: NaiveDate) -> TimeMs {
    TimeMs::new(TimeMs::from_date(expiry).as_ms() + MS_PER_DAY - 1)
}

#[derive(Debug, Clone)]
struct LegAccumulator {
    side: Side,
    right: OptionType,
    strike: Decimal,
    expiry: NaiveDate,
    quantity: Decimal,
    notional: Decimal,
    fill_count: u32,
}

impl LegAccumulator {
    fn finish(self) -> Leg {
        Leg {
            side: self.side,
            right: self.right,
            strike: self.strike,
            expiry: self.expiry,
            avg_price: self.notional.checked_div(self.quantity).unwrap_or_default(),
            quantity: self.quantity,
            fill_count: self.fill_count,
        }
    }
}

/// Running totals for the trade currently open in a group.
struct TradeBuilder {
    group_key: String,
    account: Option<String>,
    instrument_key: String,
    instrument_id: Option<InstrumentId>,
    instrument_type: InstrumentType,
    symbol: String,
    side: Side,
    opened_at: TimeMs,
    multiplier: Decimal,
    qty_opened: Decimal,
    open_notional: Decimal,
    qty_closed: Decimal,
    close_notional: Decimal,
    gross_pnl: Decimal,
    fees: Decimal,
    legs: Vec<LegAccumulator>,
    exec_ids: Vec<String>,
}

impl TradeBuilder {
    fn new(
        group: &ExecutionGroup<'_>,
        exec: &Execution,
        multiplier: Decimal,
        instrument_id: Option<InstrumentId>,
    ) -> Self {
        Self {
            group_key: format!("{}-{}", group.symbol, exec.exec_id),
            account: group.key.account.clone(),
            instrument_key: group.key.instrument_key.clone(),
            instrument_id,
            instrument_type: group.instrument_type,
            symbol: group.symbol.clone(),
            side: exec.side,
            opened_at: exec.timestamp,
            multiplier,
            qty_opened: Decimal::zero(),
            open_notional: Decimal::zero(),
            qty_closed: Decimal::zero(),
            close_notional: Decimal::zero(),
            gross_pnl: Decimal::zero(),
            fees: Decimal::zero(),
            legs: Vec::new(),
            exec_ids: Vec::new(),
        }
    }

    fn apply_quantities(&mut self, effect: &Effect) {
        self.fees += effect.fee;
        match effect.effect_type {
            EffectType::Open => {
                self.qty_opened += effect.qty;
                self.open_notional += effect.qty * effect.px;
            }
            EffectType::Close => {
                self.qty_closed += effect.qty;
                self.close_notional += effect.qty * effect.px;
                self.gross_pnl += effect.realized_pnl;
            }
        }
    }

    fn apply_fill(&mut self, exec: &Execution, instrument: &NormalizedInstrument, effect: &Effect) {
        self.apply_quantities(effect);

        if self.exec_ids.last() != Some(&exec.exec_id) {
            self.exec_ids.push(exec.exec_id.clone());
        }

        if let InstrumentMeta::Option {
            strike,
            right,
            expiry,
            ..
        } = &instrument.meta
        {
            let existing = self
                .legs
                .iter_mut()
                .find(|l| l.strike == *strike && l.right == *right && l.side == exec.side);
            match existing {
                Some(leg) => {
                    leg.quantity += effect.qty;
                    leg.notional += effect.qty * effect.px;
                    leg.fill_count += 1;
                }
                None => self.legs.push(LegAccumulator {
                    side: exec.side,
                    right: *right,
                    strike: *strike,
                    expiry: *expiry,
                    quantity: effect.qty,
                    notional: effect.qty * effect.px,
                    fill_count: 1,
                }),
            }
        }
    }

    fn finish(self, closed: Option<(TimeMs, CloseReason)>) -> Trade {
        let status = match closed {
            Some(_) => TradeStatus::Closed,
            None if self.qty_closed.is_zero() => TradeStatus::Open,
            None => TradeStatus::Partial,
        };
        let avg_close_price = if self.qty_closed.is_zero() {
            None
        } else {
            self.close_notional.checked_div(self.qty_closed)
        };

        Trade {
            group_key: self.group_key,
            account: self.account,
            instrument_key: self.instrument_key,
            instrument_id: self.instrument_id,
            instrument_type: self.instrument_type,
            symbol: self.symbol,
            side: self.side,
            status,
            opened_at: self.opened_at,
            closed_at: closed.map(|(at, _)| at),
            avg_open_price: self
                .open_notional
                .checked_div(self.qty_opened)
                .unwrap_or_default(),
            avg_close_price,
            realized_pnl: closed.map(|_| self.gross_pnl - self.fees),
            qty_opened: self.qty_opened,
            qty_closed: self.qty_closed,
            fees: self.fees,
            multiplier: self.multiplier,
            legs: self.legs.into_iter().map(LegAccumulator::finish).collect(),
            close_reason: closed.map(|(_, reason)| reason),
            exec_ids: self.exec_ids,
        }
    }
}

/// Rebuilds trades from executions.
///
/// Resolved instruments, when supplied, provide stored multipliers and the
/// instrument ids stamped on single-instrument trades.
pub struct Matcher {
    config: MatchConfig,
    instruments: HashMap<String, ResolvedInstrument>,
}

impl Matcher {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            instruments: HashMap::new(),
        }
    }

    pub fn with_instruments(
        mut self,
        instruments: impl IntoIterator<Item = ResolvedInstrument>,
    ) -> Self {
        self.instruments.extend(
            instruments
                .into_iter()
                .map(|i| (i.unique_symbol.clone(), i)),
        );
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Trades in group first-seen order, chronological within a group.
    pub fn match_executions(&self, executions: &[Execution]) -> Result<Vec<Trade>, MatchError> {
        let groups = group_executions(executions, &self.config.calendar)?;
        debug!(
            executions = executions.len(),
            groups = groups.len(),
            "Grouped executions"
        );

        let mut trades = Vec::new();
        for group in &groups {
            trades.extend(self.match_group(group)?);
        }
        Ok(trades)
    }

    fn multiplier_for(&self, instrument: &NormalizedInstrument) -> Decimal {
        self.instruments
            .get(&instrument.unique_symbol)
            .map(|r| r.multiplier)
            .unwrap_or(instrument.multiplier)
    }

    fn instrument_id_for(&self, instrument: &NormalizedInstrument) -> Option<InstrumentId> {
        if instrument.instrument_type == InstrumentType::Option {
            return None;
        }
        self.instruments
            .get(&instrument.unique_symbol)
            .map(|r| r.instrument_id)
    }

    /// Quantity of the fill the book cannot absorb under the current policy.
    fn excess_quantity(&self, tracker: &PositionTracker, exec: &Execution) -> Decimal {
        match (exec.position_effect, self.config.flip_policy) {
            (Some(PositionEffect::Close), _) => tracker.unclosable(exec.side, exec.quantity),
            (_, FlipPolicy::Reject) => tracker.overfill(exec.side, exec.quantity),
            (_, FlipPolicy::Split) => Decimal::zero(),
        }
    }

    fn match_group(&self, group: &ExecutionGroup<'_>) -> Result<Vec<Trade>, MatchError> {
        let mut trackers: HashMap<&str, PositionTracker> = HashMap::new();
        let mut current: Option<TradeBuilder> = None;
        let mut trades = Vec::new();

        for GroupedExecution {
            execution: exec,
            instrument,
            ..
        } in &group.executions
        {
            let contract = instrument.unique_symbol.as_str();
            let multiplier = self.multiplier_for(instrument);
            let tracker = trackers
                .entry(contract)
                .or_insert_with(|| PositionTracker::new(multiplier));

            let excess = self.excess_quantity(tracker, exec);
            if excess.is_positive() {
                warn!(
                    group = %group.key,
                    exec_id = %exec.exec_id,
                    excess = %excess,
                    "Execution closes more than the open position"
                );
                return Err(MatchError::UnmatchedQuantity {
                    group: group.key.to_string(),
                    excess,
                    exec_id: exec.exec_id.clone(),
                });
            }

            let effects = tracker.process_fill(
                exec.side,
                exec.quantity,
                exec.price,
                exec.fees,
                exec.timestamp,
            );
            let others_flat = trackers
                .iter()
                .filter(|(k, _)| **k != contract)
                .all(|(_, t)| t.is_flat());

            for effect in effects {
                let builder = current.get_or_insert_with(|| {
                    TradeBuilder::new(group, exec, multiplier, self.instrument_id_for(instrument))
                });
                builder.apply_fill(exec, instrument, &effect);

                if effect.effect_type == EffectType::Close && effect.flat_after && others_flat {
                    if let Some(done) = current.take() {
                        let trade = done.finish(Some((exec.timestamp, CloseReason::Executions)));
                        debug!(
                            group_key = %trade.group_key,
                            realized_pnl = ?trade.realized_pnl,
                            "Trade closed"
                        );
                        trades.push(trade);
                    }
                }
            }
        }

        if let Some(mut builder) = current.take() {
            match self.expired(group) {
                Some(expiry) => {
                    let closed_at = expiry_close_time(expiry);
                    let mut contracts: Vec<&str> = trackers.keys().copied().collect();
                    contracts.sort_unstable();
                    for contract in contracts {
                        let Some(tracker) = trackers.get_mut(contract) else {
                            continue;
                        };
                        if tracker.is_flat() {
                            continue;
                        }
                        let side = if tracker.state.is_long() {
                            Side::Sell
                        } else {
                            Side::Buy
                        };
                        let qty = tracker.state.net_size.abs();
                        for effect in
                            tracker.process_fill(side, qty, Decimal::zero(), Decimal::zero(), closed_at)
                        {
                            builder.apply_quantities(&effect);
                        }
                    }
                    let trade = builder.finish(Some((closed_at, CloseReason::Expired)));
                    debug!(
                        group_key = %trade.group_key,
                        expiry = %expiry,
                        "Expired option trade closed at zero"
                    );
                    trades.push(trade);
                }
                None => trades.push(builder.finish(None)),
            }
        }

        Ok(trades)
    }

    /// Expiry of an option group that lies before the valuation date.
    fn expired(&self, group: &ExecutionGroup<'_>) -> Option<NaiveDate> {
        let expiry = group.expiry?;
        let as_of = self.config.as_of?;
        (expiry < as_of).then_some(expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentDescriptor;
    use crate::instruments::FuturesCalendar;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn fill(id: &str, ms: i64, side: Side, qty: &str, px: &str, fee: &str, instrument: InstrumentDescriptor) -> Execution {
        Execution::new(id, TimeMs::new(ms), side, d(qty), d(px), d(fee), instrument)
    }

    fn matcher() -> Matcher {
        Matcher::new(MatchConfig::default())
    }

    #[test]
    fn test_scale_in_scale_out_single_trade() {
        let aapl = InstrumentDescriptor::equity("AAPL");
        let execs = vec![
            fill("1", 1, Side::Buy, "100", "10", "1", aapl.clone()),
            fill("2", 2, Side::Buy, "100", "12", "1", aapl.clone()),
            fill("3", 3, Side::Sell, "50", "13", "1", aapl.clone()),
            fill("4", 4, Side::Sell, "150", "14", "1", aapl),
        ];
        let trades = matcher().match_executions(&execs).unwrap();

        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.status, TradeStatus::Closed);
        assert_eq!(t.qty_opened, d("200"));
        assert_eq!(t.qty_closed, d("200"));
        assert_eq!(t.avg_open_price, d("11"));
        assert_eq!(t.avg_close_price, Some(d("13.75")));
        // FIFO: 50@(13-10) + 50@(14-10) + 100@(14-12) = 150 + 200 + 200
        assert_eq!(t.realized_pnl, Some(d("546")));
        assert_eq!(t.exec_ids, vec!["1", "2", "3", "4"]);
        assert_eq!(t.closed_at, Some(TimeMs::new(4)));
    }

    #[test]
    fn test_partial_then_reopen_after_flat() {
        let msft = InstrumentDescriptor::equity("MSFT");
        let execs = vec![
            fill("1", 1, Side::Sell, "10", "300", "0", msft.clone()),
            fill("2", 2, Side::Buy, "10", "290", "0", msft.clone()),
            fill("3", 3, Side::Buy, "5", "295", "0", msft.clone()),
            fill("4", 4, Side::Sell, "2", "296", "0", msft),
        ];
        let trades = matcher().match_executions(&execs).unwrap();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].realized_pnl, Some(d("100")));
        assert_eq!(trades[1].group_key, "MSFT-3");
        assert_eq!(trades[1].status, TradeStatus::Partial);
        assert_eq!(trades[1].open_quantity(), d("3"));
        assert_eq!(trades[1].realized_pnl, None);
        assert_eq!(trades[1].closed_at, None);
    }

    #[test]
    fn test_flip_rejected_by_default() {
        let es = InstrumentDescriptor::future("ESZ5");
        let execs = vec![
            fill("1", 1, Side::Buy, "1", "5000", "0", es.clone()),
            fill("2", 2, Side::Sell, "3", "5010", "0", es),
        ];
        match matcher().match_executions(&execs) {
            Err(MatchError::UnmatchedQuantity { excess, exec_id, group }) => {
                assert_eq!(excess, d("2"));
                assert_eq!(exec_id, "2");
                assert_eq!(group, "FUT:ESZ5");
            }
            other => panic!("Expected UnmatchedQuantity, got {:?}", other),
        }
    }

    #[test]
    fn test_flip_split_opens_new_trade() {
        let es = InstrumentDescriptor::future("ESZ5");
        let execs = vec![
            fill("1", 1, Side::Buy, "1", "5000", "1", es.clone()),
            fill("2", 2, Side::Sell, "3", "5010", "3", es),
        ];
        let config = MatchConfig::default().with_flip_policy(FlipPolicy::Split);
        let trades = Matcher::new(config).match_executions(&execs).unwrap();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].status, TradeStatus::Closed);
        assert_eq!(trades[0].fees, d("2"));
        // 10 points * 50 - fees
        assert_eq!(trades[0].realized_pnl, Some(d("498")));
        assert_eq!(trades[1].side, Side::Sell);
        assert_eq!(trades[1].qty_opened, d("2"));
        assert_eq!(trades[1].fees, d("2"));
        assert_eq!(trades[1].exec_ids, vec!["2"]);
    }

    #[test]
    fn test_close_flag_on_flat_book_is_error() {
        let execs = vec![fill("1", 1, Side::Sell, "5", "10", "0", InstrumentDescriptor::equity("AAPL"))
            .with_position_effect(PositionEffect::Close)];
        assert!(matches!(
            matcher().match_executions(&execs),
            Err(MatchError::UnmatchedQuantity { .. })
        ));
    }

    #[test]
    fn test_vertical_spread_legs() {
        let long = InstrumentDescriptor::occ("SPY240216C00450000");
        let short = InstrumentDescriptor::occ("SPY240216C00460000");
        let execs = vec![
            fill("o1", 1, Side::Buy, "2", "5.00", "1.30", long.clone()),
            fill("o2", 2, Side::Sell, "2", "2.00", "1.30", short.clone()),
            fill("c1", 3, Side::Sell, "2", "7.00", "1.30", long),
            fill("c2", 4, Side::Buy, "2", "3.00", "1.30", short),
        ];
        let trades = matcher().match_executions(&execs).unwrap();

        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.instrument_type, InstrumentType::Option);
        assert_eq!(t.symbol, "SPY");
        assert_eq!(t.instrument_key, "SPY:2024-02-16");
        assert_eq!(t.group_key, "SPY-o1");
        assert_eq!(t.qty_opened, d("4"));
        assert_eq!(t.qty_closed, d("4"));
        assert_eq!(t.fees, d("5.20"));
        // long call +2*2*100, short call -1*2*100
        assert_eq!(t.realized_pnl, Some(d("194.80")));
        assert_eq!(t.legs.len(), 4);
        assert_eq!(t.legs[0].side, Side::Buy);
        assert_eq!(t.legs[0].strike, d("450"));
        assert_eq!(t.legs[0].avg_price, d("5"));
        assert_eq!(t.instrument_id, None);
    }

    #[test]
    fn test_expired_options_close_at_zero() {
        let put = InstrumentDescriptor::occ("XYZ240119P00050000");
        let execs = vec![fill("s1", 1, Side::Sell, "3", "1.50", "0", put)];
        let config = MatchConfig::default().with_as_of(NaiveDate::from_ymd_opt(2024, 1, 22).unwrap());
        let trades = Matcher::new(config).match_executions(&execs).unwrap();

        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.status, TradeStatus::Closed);
        assert_eq!(t.close_reason, Some(CloseReason::Expired));
        assert_eq!(t.avg_close_price, Some(d("0")));
        assert_eq!(t.realized_pnl, Some(d("450")));
        assert_eq!(t.legs.len(), 1);
        assert_eq!(
            t.closed_at,
            Some(expiry_close_time(NaiveDate::from_ymd_opt(2024, 1, 19).unwrap()))
        );
    }

    #[test]
    fn test_unexpired_options_stay_open() {
        let call = InstrumentDescriptor::occ("XYZ240119C00050000");
        let execs = vec![fill("b1", 1, Side::Buy, "1", "2", "0", call)];
        let config = MatchConfig::default().with_as_of(NaiveDate::from_ymd_opt(2024, 1, 19).unwrap());
        let trades = Matcher::new(config).match_executions(&execs).unwrap();
        assert_eq!(trades[0].status, TradeStatus::Open);
        assert_eq!(trades[0].close_reason, None);
    }

    #[test]
    fn test_resolved_instruments_supply_multiplier_and_id() {
        let descriptor = InstrumentDescriptor::equity("AAPL");
        let normalized = crate::instruments::normalize(&descriptor, &FuturesCalendar::default()).unwrap();
        let resolved = ResolvedInstrument::from_normalized(InstrumentId::new(), &normalized);
        let id = resolved.instrument_id;

        let execs = vec![
            fill("1", 1, Side::Buy, "1", "10", "0", descriptor.clone()),
            fill("2", 2, Side::Sell, "1", "11", "0", descriptor),
        ];
        let trades = matcher()
            .with_instruments(vec![resolved])
            .match_executions(&execs)
            .unwrap();
        assert_eq!(trades[0].instrument_id, Some(id));
    }
}
