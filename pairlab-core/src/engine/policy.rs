//! Policy trait: the external decision function queried once per trading day.
//!
//! The engine knows nothing about how a policy decides. It builds an
//! [`Observation`] from data dated on or before the current day, asks the
//! policy for an [`Action`], and executes it at the close.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::AlignedRow;
use crate::domain::Pair;

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct PolicyError(pub String);

impl PolicyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Position state at the close of the observed day, before any trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub cash: f64,
    pub holdings_a: f64,
    pub holdings_b: f64,
    /// Cash plus holdings marked at today's prices.
    pub equity: f64,
}

impl PositionSnapshot {
    pub fn is_flat(&self) -> bool {
        self.holdings_a == 0.0 && self.holdings_b == 0.0
    }
}

/// What a policy sees on one trading day.
///
/// `history` is a trailing window of aligned rows ending with (and including)
/// today. No row is dated after `date`.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    pub pair: &'a Pair,
    pub date: NaiveDate,
    /// Position of `date` on the aligned timeline.
    pub day_index: usize,
    pub current: AlignedRow<'a>,
    pub history: &'a [AlignedRow<'a>],
    pub position: PositionSnapshot,
}

impl<'a> Observation<'a> {
    /// Closes of leg A over the history window, oldest first.
    pub fn closes_a(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().map(|r| r.a.close)
    }

    pub fn closes_b(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().map(|r| r.b.close)
    }
}

/// Trading decision for one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Keep current holdings.
    Hold,
    /// Rebalance to signed exposure per leg, as a fraction of current equity.
    Target { weight_a: f64, weight_b: f64 },
}

impl Action {
    pub fn flat() -> Self {
        Action::Target {
            weight_a: 0.0,
            weight_b: 0.0,
        }
    }
}

/// A decision policy over one pair.
///
/// Implementations must be `Send + Sync` so pairs can be simulated on worker
/// threads. `decide` is called exactly once per trading day, in date order.
pub trait Policy: Send + Sync {
    fn name(&self) -> &str;

    fn decide(&self, observation: &Observation<'_>) -> Result<Action, PolicyError>;
}

/// Adapter turning a closure into a [`Policy`].
pub struct FnPolicy<F> {
    name: String,
    f: F,
}

impl<F> FnPolicy<F>
where
    F: Fn(&Observation<'_>) -> Result<Action, PolicyError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Policy for FnPolicy<F>
where
    F: Fn(&Observation<'_>) -> Result<Action, PolicyError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&self, observation: &Observation<'_>) -> Result<Action, PolicyError> {
        (self.f)(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, ClusterId};

    #[test]
    fn fn_policy_delegates() {
        let policy = FnPolicy::new("half", |obs: &Observation<'_>| {
            if obs.day_index == 0 {
                Ok(Action::Hold)
            } else {
                Ok(Action::Target {
                    weight_a: 0.5,
                    weight_b: -0.5,
                })
            }
        });
        assert_eq!(policy.name(), "half");

        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let pair = Pair::new("A".into(), "B".into(), ClusterId(0), 1.0).unwrap();
        let a = Bar::from_close(date, 10.0);
        let b = Bar::from_close(date, 20.0);
        let row = AlignedRow {
            date,
            a: &a,
            b: &b,
            a_stale: false,
            b_stale: false,
        };
        let rows = [row];
        let mut obs = Observation {
            pair: &pair,
            date,
            day_index: 0,
            current: row,
            history: &rows,
            position: PositionSnapshot {
                cash: 100.0,
                holdings_a: 0.0,
                holdings_b: 0.0,
                equity: 100.0,
            },
        };
        assert_eq!(policy.decide(&obs).unwrap(), Action::Hold);
        obs.day_index = 1;
        assert_eq!(
            policy.decide(&obs).unwrap(),
            Action::Target {
                weight_a: 0.5,
                weight_b: -0.5
            }
        );
        assert!(obs.position.is_flat());
        assert_eq!(obs.closes_b().collect::<Vec<_>>(), vec![20.0]);
    }
}
