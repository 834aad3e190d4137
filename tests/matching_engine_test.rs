//! Matching engine tests over realistic broker executions.
//!
//! Covers:
//! - Equity round trip P&L (AAPL, 548.00 net)
//! - Conservation: quantities and fees
//! - Determinism under input reordering with equal timestamps
//! - Futures multipliers, option strategies, expiry handling

use chrono::NaiveDate;
use tradejournal::domain::{
    CloseReason, Decimal, Execution, InstrumentDescriptor, InstrumentType, OptionType,
    PositionEffect, Side, TimeMs, TradeStatus,
};
use tradejournal::engine::{match_executions, FlipPolicy, MatchConfig, MatchError};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn exec(
    id: &str,
    ms: i64,
    side: Side,
    qty: &str,
    px: &str,
    fee: &str,
    instrument: InstrumentDescriptor,
) -> Execution {
    Execution::new(id, TimeMs::new(ms), side, d(qty), d(px), d(fee), instrument)
}

fn config() -> MatchConfig {
    MatchConfig::default()
}

// =============================================================================
// Equities
// =============================================================================

#[test]
fn aapl_round_trip_realizes_548() {
    let execs = vec![
        exec("e1", 1_000, Side::Buy, "100", "150.25", "1.00", InstrumentDescriptor::equity("AAPL")),
        exec("e2", 2_000, Side::Sell, "100", "155.75", "1.00", InstrumentDescriptor::equity("AAPL")),
    ];
    let trades = match_executions(&execs, &config()).unwrap();

    assert_eq!(trades.len(), 1);
    let t = &trades[0];
    assert_eq!(t.group_key, "AAPL-e1");
    assert_eq!(t.instrument_key, "EQ:AAPL");
    assert_eq!(t.status, TradeStatus::Closed);
    assert_eq!(t.side, Side::Buy);
    assert_eq!(t.avg_open_price, d("150.25"));
    assert_eq!(t.avg_close_price, Some(d("155.75")));
    assert_eq!(t.fees, d("2"));
    assert_eq!(t.realized_pnl, Some(d("548.00")));
    assert_eq!(t.close_reason, Some(CloseReason::Executions));
    assert_eq!(t.opened_at, TimeMs::new(1_000));
    assert_eq!(t.closed_at, Some(TimeMs::new(2_000)));
}

#[test]
fn conservation_of_quantity_and_fees() {
    let tsla = InstrumentDescriptor::equity("TSLA");
    let execs = vec![
        exec("1", 1, Side::Buy, "30", "200", "0.30", tsla.clone()),
        exec("2", 2, Side::Buy, "20", "205", "0.20", tsla.clone()),
        exec("3", 3, Side::Sell, "50", "210", "0.50", tsla.clone()),
        exec("4", 4, Side::Sell, "10", "212", "0.10", tsla.clone()),
        exec("5", 5, Side::Buy, "10", "208", "0.10", tsla.clone()),
        exec("6", 6, Side::Buy, "7", "209", "0.07", tsla),
    ];
    let trades = match_executions(&execs, &config()).unwrap();

    assert_eq!(trades.len(), 3);
    for t in trades.iter().filter(|t| t.is_closed()) {
        assert_eq!(t.qty_opened, t.qty_closed);
    }
    let trade_fees: Decimal = trades.iter().map(|t| t.fees).sum();
    let exec_fees: Decimal = execs.iter().map(|e| e.fees).sum();
    assert_eq!(trade_fees, exec_fees);

    assert_eq!(trades[1].side, Side::Sell);
    assert_eq!(trades[1].realized_pnl, Some(d("39.80")));
    assert_eq!(trades[2].status, TradeStatus::Open);
    assert_eq!(trades[2].avg_close_price, None);
}

#[test]
fn equal_timestamps_keep_input_order() {
    let spy = InstrumentDescriptor::equity("SPY");
    let execs = vec![
        exec("open", 5, Side::Buy, "10", "450", "0", spy.clone()),
        exec("close", 5, Side::Sell, "10", "451", "0", spy.clone()),
        exec("late", 9, Side::Buy, "1", "452", "0", spy),
    ];
    let first = match_executions(&execs, &config()).unwrap();
    let second = match_executions(&execs, &config()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].group_key, "SPY-open");
    assert_eq!(first[0].realized_pnl, Some(d("10")));
}

#[test]
fn suffixed_tickers_match_as_one_instrument() {
    let execs = vec![
        exec("1", 1, Side::Buy, "5", "240", "0", InstrumentDescriptor::equity("TSLA.US")),
        exec("2", 2, Side::Sell, "5", "245", "0", InstrumentDescriptor::equity("tsla")),
    ];
    let trades = match_executions(&execs, &config()).unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].symbol, "TSLA");
    assert!(trades[0].is_closed());
}

#[test]
fn over_close_rejected_by_default_and_split_on_request() {
    let nvda = InstrumentDescriptor::equity("NVDA");
    let execs = vec![
        exec("1", 1, Side::Buy, "10", "100", "0", nvda.clone()),
        exec("2", 2, Side::Sell, "15", "110", "1.5", nvda),
    ];

    match match_executions(&execs, &config()) {
        Err(MatchError::UnmatchedQuantity { excess, .. }) => assert_eq!(excess, d("5")),
        other => panic!("Expected UnmatchedQuantity, got {:?}", other),
    }

    let split = config().with_flip_policy(FlipPolicy::Split);
    let trades = match_executions(&execs, &split).unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].realized_pnl, Some(d("99")));
    assert_eq!(trades[1].side, Side::Sell);
    assert_eq!(trades[1].open_quantity(), d("5"));
    assert_eq!(trades[1].fees, d("0.5"));
}

#[test]
fn close_flag_beyond_position_is_always_rejected() {
    let amd = InstrumentDescriptor::equity("AMD");
    let execs = vec![
        exec("1", 1, Side::Buy, "10", "100", "0", amd.clone()),
        exec("2", 2, Side::Sell, "12", "110", "0", amd).with_position_effect(PositionEffect::Close),
    ];
    let split = config().with_flip_policy(FlipPolicy::Split);
    match match_executions(&execs, &split) {
        Err(MatchError::UnmatchedQuantity { excess, exec_id, .. }) => {
            assert_eq!(excess, d("2"));
            assert_eq!(exec_id, "2");
        }
        other => panic!("Expected UnmatchedQuantity, got {:?}", other),
    }
}

// =============================================================================
// Futures
// =============================================================================

#[test]
fn futures_use_contract_multiplier() {
    let nq = InstrumentDescriptor::future("NQH24");
    let execs = vec![
        exec("1", 1, Side::Sell, "2", "17500.25", "2.10", nq.clone()),
        exec("2", 2, Side::Buy, "2", "17480.25", "2.10", nq),
    ];
    let trades = match_executions(&execs, &config()).unwrap();

    assert_eq!(trades.len(), 1);
    let t = &trades[0];
    assert_eq!(t.instrument_type, InstrumentType::Future);
    assert_eq!(t.symbol, "NQH24");
    assert_eq!(t.multiplier, d("20"));
    // 20 points * 2 contracts * 20 - 4.20
    assert_eq!(t.realized_pnl, Some(d("795.80")));
}

// =============================================================================
// Options
// =============================================================================

#[test]
fn iron_condor_is_one_strategy_trade() {
    let expiry = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let leg = |strike: &str, right: OptionType| {
        InstrumentDescriptor::option("QQQ", expiry, d(strike), right)
    };
    let execs = vec![
        exec("o1", 10, Side::Sell, "1", "2.10", "0.65", leg("420", OptionType::Put)),
        exec("o2", 10, Side::Buy, "1", "1.20", "0.65", leg("410", OptionType::Put)),
        exec("o3", 10, Side::Sell, "1", "2.30", "0.65", leg("460", OptionType::Call)),
        exec("o4", 10, Side::Buy, "1", "1.10", "0.65", leg("470", OptionType::Call)),
        exec("c1", 20, Side::Buy, "1", "0.50", "0.65", leg("420", OptionType::Put)),
        exec("c2", 20, Side::Sell, "1", "0.10", "0.65", leg("410", OptionType::Put)),
        exec("c3", 20, Side::Buy, "1", "0.60", "0.65", leg("460", OptionType::Call)),
        exec("c4", 20, Side::Sell, "1", "0.20", "0.65", leg("470", OptionType::Call)),
    ];
    let trades = match_executions(&execs, &config()).unwrap();

    assert_eq!(trades.len(), 1);
    let t = &trades[0];
    assert_eq!(t.instrument_type, InstrumentType::Option);
    assert_eq!(t.instrument_key, "QQQ:2024-03-15");
    assert_eq!(t.status, TradeStatus::Closed);
    assert_eq!(t.legs.len(), 8);
    assert_eq!(t.qty_opened, t.qty_closed);
    assert_eq!(t.fees, d("5.20"));
    // credit 2.10 - 1.20 + 2.30 - 1.10 = 2.10, debit to close 0.50 - 0.10 + 0.60 - 0.20 = 0.80
    assert_eq!(t.realized_pnl, Some(d("124.80")));
    assert!(t.legs.iter().all(|l| l.fill_count == 1 && l.expiry == expiry));
}

#[test]
fn legs_aggregate_repeated_fills() {
    let call = InstrumentDescriptor::occ("AAPL240621C00190000");
    let execs = vec![
        exec("1", 1, Side::Buy, "1", "3.00", "0", call.clone()),
        exec("2", 2, Side::Buy, "3", "4.00", "0", call.clone()),
        exec("3", 3, Side::Sell, "4", "5.00", "0", call),
    ];
    let trades = match_executions(&execs, &config()).unwrap();

    let t = &trades[0];
    assert_eq!(t.legs.len(), 2);
    assert_eq!(t.legs[0].side, Side::Buy);
    assert_eq!(t.legs[0].quantity, d("4"));
    assert_eq!(t.legs[0].avg_price, d("3.75"));
    assert_eq!(t.legs[0].fill_count, 2);
    assert_eq!(t.legs[1].side, Side::Sell);
    assert_eq!(t.realized_pnl, Some(d("500")));
}

#[test]
fn expired_short_put_closes_at_zero() {
    let put = InstrumentDescriptor::occ("IWM240119P00190000");
    let execs = vec![exec("s", 1, Side::Sell, "2", "1.25", "1.30", put)];

    let open = match_executions(&execs, &config()).unwrap();
    assert_eq!(open[0].status, TradeStatus::Open);

    let as_of = config().with_as_of(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    let trades = match_executions(&execs, &as_of).unwrap();
    let t = &trades[0];
    assert_eq!(t.status, TradeStatus::Closed);
    assert_eq!(t.close_reason, Some(CloseReason::Expired));
    assert_eq!(t.qty_closed, d("2"));
    assert_eq!(t.realized_pnl, Some(d("248.70")));
}

#[test]
fn invalid_executions_are_reported() {
    let execs = vec![exec("neg", 1, Side::Buy, "-1", "10", "0", InstrumentDescriptor::equity("AAPL"))];
    assert!(matches!(
        match_executions(&execs, &config()),
        Err(MatchError::InvalidExecution { .. })
    ));

    let unknown_root = vec![exec("f", 1, Side::Buy, "1", "10", "0", InstrumentDescriptor::future("XXZ5"))];
    assert!(matches!(
        match_executions(&unknown_root, &config()),
        Err(MatchError::Resolve(_))
    ));
}
