//! Per-pair ledger: cash, holdings, trade history and daily marks.
//!
//! Append-only: entries are added in strictly increasing date order and never
//! modified. Equity on every day must be reproducible from the initial capital
//! and the recorded fills; [`Ledger::replay`] performs that reconstruction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cost_model::CostModel;
use crate::domain::Pair;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("ledger entry for {date} is not after the last entry ({last})")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },
}

/// Which leg of the pair a fill belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leg {
    A,
    B,
}

/// One executed share change on one leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegFill {
    pub date: NaiveDate,
    pub leg: Leg,
    /// Signed share delta (positive = buy).
    pub quantity: f64,
    /// Execution price including slippage.
    pub price: f64,
    pub commission: f64,
    /// PnL realized by this fill against the leg's average cost.
    pub realized_pnl: f64,
}

impl LegFill {
    /// Cash change caused by this fill.
    pub fn cash_flow(&self) -> f64 {
        -self.quantity * self.price - self.commission
    }
}

/// One day of the ledger, recorded after execution at the close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub cash: f64,
    pub holdings_a: f64,
    pub holdings_b: f64,
    /// Market value of the holdings at `price_a` / `price_b`.
    pub mark_value: f64,
    /// Equity change versus the previous entry (initial capital for the first).
    pub daily_return: f64,
    pub price_a: f64,
    pub price_b: f64,
    /// True when the day executed at least one fill.
    pub traded: bool,
}

impl LedgerEntry {
    pub fn equity(&self) -> f64 {
        self.cash + self.mark_value
    }
}

/// Why a ledger stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyFailure {
    /// Day on which the policy failed. No entry exists for it.
    pub date: NaiveDate,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerStatus {
    Complete,
    Incomplete(PolicyFailure),
}

/// Running average-cost position for one leg.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LegPosition {
    shares: f64,
    avg_price: f64,
}

impl LegPosition {
    /// Apply a signed delta at `price`; returns realized PnL.
    fn apply(&mut self, delta: f64, price: f64) -> f64 {
        let before = self.shares;
        let after = before + delta;

        if before == 0.0 || before.signum() == delta.signum() {
            let total = before.abs() + delta.abs();
            self.avg_price = if total > 0.0 {
                (before.abs() * self.avg_price + delta.abs() * price) / total
            } else {
                0.0
            };
            self.shares = after;
            return 0.0;
        }

        let closed = delta.abs().min(before.abs());
        let realized = closed * (price - self.avg_price) * before.signum();
        self.shares = after;
        if after == 0.0 {
            self.avg_price = 0.0;
        } else if after.signum() != before.signum() {
            // Flipped through zero: the remainder opened at this price.
            self.avg_price = price;
        }
        realized
    }

    fn unrealized(&self, mark: f64) -> f64 {
        self.shares * (mark - self.avg_price)
    }
}

/// Ledger of one pair's simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pair: Pair,
    initial_capital: f64,
    cash: f64,
    leg_a: LegPosition,
    leg_b: LegPosition,
    realized_pnl: f64,
    commission_paid: f64,
    fills: Vec<LegFill>,
    entries: Vec<LedgerEntry>,
    status: LedgerStatus,
}

impl Ledger {
    pub fn new(pair: Pair, initial_capital: f64) -> Self {
        Self {
            pair,
            initial_capital,
            cash: initial_capital,
            leg_a: LegPosition::default(),
            leg_b: LegPosition::default(),
            realized_pnl: 0.0,
            commission_paid: 0.0,
            fills: Vec::new(),
            entries: Vec::new(),
            status: LedgerStatus::Complete,
        }
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holdings_a(&self) -> f64 {
        self.leg_a.shares
    }

    pub fn holdings_b(&self) -> f64 {
        self.leg_b.shares
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    pub fn unrealized_pnl(&self, price_a: f64, price_b: f64) -> f64 {
        self.leg_a.unrealized(price_a) + self.leg_b.unrealized(price_b)
    }

    pub fn fills(&self) -> &[LegFill] {
        &self.fills
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn last_entry(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub fn status(&self) -> &LedgerStatus {
        &self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == LedgerStatus::Complete
    }

    /// Market value of current holdings.
    pub fn mark_value(&self, price_a: f64, price_b: f64) -> f64 {
        self.leg_a.shares * price_a + self.leg_b.shares * price_b
    }

    pub fn equity(&self, price_a: f64, price_b: f64) -> f64 {
        self.cash + self.mark_value(price_a, price_b)
    }

    /// Equity of the last entry, or initial capital before any entry.
    pub fn last_equity(&self) -> f64 {
        self.entries
            .last()
            .map_or(self.initial_capital, LedgerEntry::equity)
    }

    /// Number of days on which at least one fill executed.
    pub fn trade_days(&self) -> usize {
        self.entries.iter().filter(|e| e.traded).count()
    }

    pub fn daily_returns(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.daily_return).collect()
    }

    /// Equity per entry (without the initial capital point).
    pub fn equity_curve(&self) -> Vec<f64> {
        self.entries.iter().map(LedgerEntry::equity).collect()
    }

    /// Rebalance both legs at once. Both deltas are applied or neither is
    /// recorded; zero deltas produce no fill.
    pub(crate) fn rebalance(
        &mut self,
        date: NaiveDate,
        (delta_a, price_a): (f64, f64),
        (delta_b, price_b): (f64, f64),
        cost_model: &CostModel,
    ) -> usize {
        let mut count = 0;
        for (leg, delta, raw) in [(Leg::A, delta_a, price_a), (Leg::B, delta_b, price_b)] {
            if delta == 0.0 {
                continue;
            }
            let price = cost_model.fill_price(raw, delta);
            let commission = cost_model.commission(price, delta);
            let position = match leg {
                Leg::A => &mut self.leg_a,
                Leg::B => &mut self.leg_b,
            };
            let realized_pnl = position.apply(delta, price);
            let fill = LegFill {
                date,
                leg,
                quantity: delta,
                price,
                commission,
                realized_pnl,
            };
            self.cash += fill.cash_flow();
            self.realized_pnl += realized_pnl;
            self.commission_paid += commission;
            self.fills.push(fill);
            count += 1;
        }
        count
    }

    /// Mark holdings at the day's prices and append an entry.
    pub(crate) fn append(
        &mut self,
        date: NaiveDate,
        price_a: f64,
        price_b: f64,
        traded: bool,
    ) -> Result<&LedgerEntry, LedgerError> {
        if let Some(last) = self.entries.last() {
            if date <= last.date {
                return Err(LedgerError::OutOfOrder {
                    date,
                    last: last.date,
                });
            }
        }

        let prev_equity = self.last_equity();
        let mark_value = self.mark_value(price_a, price_b);
        let equity = self.cash + mark_value;
        let daily_return = if prev_equity > 0.0 {
            (equity - prev_equity) / prev_equity
        } else {
            0.0
        };

        self.entries.push(LedgerEntry {
            date,
            cash: self.cash,
            holdings_a: self.leg_a.shares,
            holdings_b: self.leg_b.shares,
            mark_value,
            daily_return,
            price_a,
            price_b,
            traded,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub(crate) fn mark_incomplete(&mut self, failure: PolicyFailure) {
        self.status = LedgerStatus::Incomplete(failure);
    }

    /// Rebuild per-entry equity from initial capital and the fill history.
    pub fn replay(&self) -> Vec<f64> {
        let mut cash = self.initial_capital;
        let (mut shares_a, mut shares_b) = (0.0, 0.0);
        let mut fills = self.fills.iter().peekable();

        self.entries
            .iter()
            .map(|entry| {
                while let Some(fill) = fills.next_if(|f| f.date <= entry.date) {
                    cash += fill.cash_flow();
                    match fill.leg {
                        Leg::A => shares_a += fill.quantity,
                        Leg::B => shares_b += fill.quantity,
                    }
                }
                cash + shares_a * entry.price_a + shares_b * entry.price_b
            })
            .collect()
    }
}
