use crate::domain::{Decimal, Side, TimeMs};
use std::collections::VecDeque;

/// Current state of a position in one contract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionState {
    /// Current net size: positive = long, negative = short, zero = flat.
    pub net_size: Decimal,

    /// Average entry price of the remaining lots (only meaningful when net_size != 0).
    pub avg_entry_px: Decimal,
}

impl PositionState {
    pub fn new() -> Self {
        Self {
            net_size: Decimal::zero(),
            avg_entry_px: Decimal::zero(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.net_size.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.net_size.is_positive()
    }

    pub fn is_short(&self) -> bool {
        self.net_size.is_negative()
    }
}

/// An open lot, oldest first in the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    /// Always positive; direction comes from the position sign.
    pub qty: Decimal,
    pub px: Decimal,
    pub opened_at: TimeMs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectType {
    Open,
    Close,
}

/// The part of a fill that opened or closed quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub effect_type: EffectType,
    pub qty: Decimal,
    pub px: Decimal,
    /// Share of the fill's fee attributed to this effect.
    pub fee: Decimal,
    /// Gross realized P&L of the matched lots, multiplier applied. Zero for opens.
    pub realized_pnl: Decimal,
    /// The contract is flat once this effect is applied.
    pub flat_after: bool,
}

/// FIFO lot book for a single contract.
pub struct PositionTracker {
    pub state: PositionState,
    multiplier: Decimal,
    lots: VecDeque<Lot>,
}

impl PositionTracker {
    pub fn new(multiplier: Decimal) -> Self {
        Self {
            state: PositionState::new(),
            multiplier,
            lots: VecDeque::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.state.is_flat()
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    /// Quantity of a fill that would go past flat into the opposite direction.
    pub fn overfill(&self, side: Side, qty: Decimal) -> Decimal {
        let old_size = self.state.net_size;
        let new_size = old_size + signed(side, qty);
        if self.is_flip(old_size, new_size) {
            new_size.abs()
        } else {
            Decimal::zero()
        }
    }

    /// Quantity of a fill that does not reduce the position.
    pub fn unclosable(&self, side: Side, qty: Decimal) -> Decimal {
        let reduces = match side {
            Side::Buy => self.state.is_short(),
            Side::Sell => self.state.is_long(),
        };
        if reduces {
            self.overfill(side, qty)
        } else {
            qty
        }
    }

    /// Apply a fill. A fill that crosses flat yields a close effect followed
    /// by an open effect, with the fee split pro-rata.
    pub fn process_fill(
        &mut self,
        side: Side,
        qty: Decimal,
        px: Decimal,
        fee: Decimal,
        time: TimeMs,
    ) -> Vec<Effect> {
        let old_size = self.state.net_size;
        let new_size = old_size + signed(side, qty);

        if self.is_flip(old_size, new_size) {
            self.handle_flip(qty, px, fee, time, old_size, new_size)
        } else if old_size.abs() < new_size.abs() {
            vec![self.handle_open(qty, px, fee, time, new_size)]
        } else {
            vec![self.handle_close(qty, px, fee, new_size)]
        }
    }

    /// Check if this is a flip (crossing from long to short or vice versa).
    fn is_flip(&self, old_size: Decimal, new_size: Decimal) -> bool {
        if old_size.is_zero() || new_size.is_zero() {
            return false;
        }
        old_size.is_positive() != new_size.is_positive()
    }

    /// Open from flat or add to an existing position.
    fn handle_open(&mut self, qty: Decimal, px: Decimal, fee: Decimal, time: TimeMs, new_size: Decimal) -> Effect {
        self.lots.push_back(Lot {
            qty,
            px,
            opened_at: time,
        });
        self.state.net_size = new_size;
        self.refresh_avg();

        Effect {
            effect_type: EffectType::Open,
            qty,
            px,
            fee,
            realized_pnl: Decimal::zero(),
            flat_after: false,
        }
    }

    /// Reduce the position, consuming lots oldest first.
    fn handle_close(&mut self, qty: Decimal, px: Decimal, fee: Decimal, new_size: Decimal) -> Effect {
        let direction = if self.state.is_long() {
            Decimal::one()
        } else {
            -Decimal::one()
        };

        let mut remaining = qty;
        let mut realized = Decimal::zero();
        while remaining.is_positive() {
            let Some(lot) = self.lots.front_mut() else {
                break;
            };
            let matched = remaining.min(lot.qty);
            realized += (px - lot.px) * matched * direction;
            lot.qty -= matched;
            remaining -= matched;
            if lot.qty.is_zero() {
                self.lots.pop_front();
            }
        }

        self.state.net_size = new_size;
        self.refresh_avg();

        Effect {
            effect_type: EffectType::Close,
            qty,
            px,
            fee,
            realized_pnl: realized * self.multiplier,
            flat_after: self.state.is_flat(),
        }
    }

    /// Handle a flip (long to short or short to long).
    fn handle_flip(
        &mut self,
        qty: Decimal,
        px: Decimal,
        fee: Decimal,
        time: TimeMs,
        old_size: Decimal,
        new_size: Decimal,
    ) -> Vec<Effect> {
        let close_qty = old_size.abs();
        let open_qty = new_size.abs();

        let close_fee = (fee * close_qty).checked_div(qty).unwrap_or_default();
        let open_fee = fee - close_fee;

        let close = self.handle_close(close_qty, px, close_fee, Decimal::zero());
        let open = self.handle_open(open_qty, px, open_fee, time, new_size);
        vec![close, open]
    }

    fn refresh_avg(&mut self) {
        let qty: Decimal = self.lots.iter().map(|l| l.qty).sum();
        let notional: Decimal = self.lots.iter().map(|l| l.qty * l.px).sum();
        self.state.avg_entry_px = notional.checked_div(qty).unwrap_or_default();
    }
}

fn signed(side: Side, qty: Decimal) -> Decimal {
    match side {
        Side::Buy => qty,
        Side::Sell => -qty,
    }
}
