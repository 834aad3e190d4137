//! Raw broker execution (fill).

use super::{Decimal, InstrumentDescriptor, Side, TimeMs};
use serde::{Deserialize, Serialize};

/// Broker-declared intent of a fill, when the broker reports it
/// (e.g. "Buy to Open", "Sell to Close").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionEffect {
    Open,
    Close,
}

/// A single broker fill. Immutable input to matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Broker execution id; unique within an import.
    pub exec_id: String,
    pub order_id: Option<String>,
    /// Broker account; executions in different accounts never match.
    pub account: Option<String>,
    pub timestamp: TimeMs,
    pub side: Side,
    /// Absolute quantity (shares or contracts).
    pub quantity: Decimal,
    /// Price per share / per contract unit (before multiplier).
    pub price: Decimal,
    pub fees: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_effect: Option<PositionEffect>,
    pub instrument: InstrumentDescriptor,
}

impl Execution {
    pub fn new(
        exec_id: &str,
        timestamp: TimeMs,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        fees: Decimal,
        instrument: InstrumentDescriptor,
    ) -> Self {
        Self {
            exec_id: exec_id.to_string(),
            order_id: None,
            account: None,
            timestamp,
            side,
            quantity,
            price,
            fees,
            position_effect: None,
            instrument,
        }
    }

    pub fn with_order_id(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_string());
        self
    }

    pub fn with_account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    pub fn with_position_effect(mut self, effect: PositionEffect) -> Self {
        self.position_effect = Some(effect);
        self
    }

    /// Signed quantity: Buy = +qty, Sell = -qty.
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            Side::Buy => self.quantity,
            Side::Sell => -self.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_signed_quantity() {
        let buy = Execution::new(
            "e1",
            TimeMs::new(1),
            Side::Buy,
            d("100"),
            d("150.25"),
            d("1"),
            InstrumentDescriptor::equity("AAPL"),
        );
        assert_eq!(buy.signed_quantity(), d("100"));

        let sell = Execution {
            side: Side::Sell,
            ..buy
        };
        assert_eq!(sell.signed_quantity(), d("-100"));
    }

    #[test]
    fn test_serde_omits_missing_position_effect() {
        let exec = Execution::new(
            "e1",
            TimeMs::new(1),
            Side::Buy,
            d("1"),
            d("2"),
            d("0"),
            InstrumentDescriptor::equity("AAPL"),
        );
        let json = serde_json::to_value(&exec).unwrap();
        assert!(json.get("position_effect").is_none());

        let back: Execution = serde_json::from_value(json).unwrap();
        assert_eq!(back, exec);
    }
}
