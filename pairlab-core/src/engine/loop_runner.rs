//! Day-by-day simulation loop: the heart of the engine.
//!
//! Per aligned day, in date order:
//! 1. Observation build from rows dated on or before today
//! 2. Policy query (cadence days only)
//! 3. Execution at today's close, both legs at once
//! 4. Ledger append, marked at today's close

use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::data::{align_pair, AlignedRow, AlignmentError};
use crate::domain::{InstrumentId, Pair, TimeSeries};

use super::config::SimulationConfig;
use super::ledger::{Ledger, LedgerError, PolicyFailure};
use super::policy::{Action, Observation, Policy, PolicyError, PositionSnapshot};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error("series for {found} passed where {expected} was expected")]
    SeriesMismatch {
        expected: InstrumentId,
        found: InstrumentId,
    },

    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    #[error("simulation of {pair} cancelled before {date}")]
    Cancelled { pair: String, date: NaiveDate },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Last markable close per leg. Void bars keep the previous mark.
#[derive(Debug, Default)]
struct Marks {
    a: Option<f64>,
    b: Option<f64>,
}

impl Marks {
    fn update(&mut self, row: &AlignedRow<'_>) -> Option<(f64, f64)> {
        if row.a.is_markable() {
            self.a = Some(row.a.close);
        }
        if row.b.is_markable() {
            self.b = Some(row.b.close);
        }
        self.a.zip(self.b)
    }
}

/// Simulate one pair.
///
/// A policy failure stops the loop and returns the ledger marked incomplete
/// as of the last successful day. Cancellation drops the partial ledger.
pub fn simulate(
    pair: &Pair,
    series_a: &TimeSeries,
    series_b: &TimeSeries,
    policy: &dyn Policy,
    config: &SimulationConfig,
    cancel: Option<&AtomicBool>,
) -> Result<Ledger, SimulationError> {
    config.validate().map_err(SimulationError::InvalidConfig)?;
    for (expected, series) in [(&pair.instrument_a, series_a), (&pair.instrument_b, series_b)] {
        if series.instrument() != expected {
            return Err(SimulationError::SeriesMismatch {
                expected: expected.clone(),
                found: series.instrument().clone(),
            });
        }
    }

    let aligned = align_pair(series_a, series_b)?;
    if !aligned.skipped.is_empty() {
        log::debug!(
            "{pair}: skipped {} leading days without data for both legs",
            aligned.skipped.len()
        );
    }

    let mut ledger = Ledger::new(pair.clone(), config.initial_capital);
    let mut marks = Marks::default();
    let mut prev_date: Option<NaiveDate> = None;

    for (t, row) in aligned.rows.iter().enumerate() {
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Err(SimulationError::Cancelled {
                pair: pair.label(),
                date: row.date,
            });
        }

        let is_trading_day = config.frequency.is_trading_day(t, row.date, prev_date);
        prev_date = Some(row.date);

        let Some((price_a, price_b)) = marks.update(row) else {
            log::debug!("{pair}: no valid mark on {}, day skipped", row.date);
            continue;
        };

        let mut fills = 0;
        if is_trading_day {
            let start = (t + 1).saturating_sub(config.window_length);
            let observation = Observation {
                pair,
                date: row.date,
                day_index: t,
                current: *row,
                history: &aligned.rows[start..=t],
                position: PositionSnapshot {
                    cash: ledger.cash(),
                    holdings_a: ledger.holdings_a(),
                    holdings_b: ledger.holdings_b(),
                    equity: ledger.equity(price_a, price_b),
                },
            };

            match policy.decide(&observation).and_then(check_action) {
                Ok(Action::Hold) => {}
                Ok(Action::Target { weight_a, weight_b }) => {
                    let equity = observation.position.equity;
                    let (weight_a, weight_b) =
                        cap_gross(weight_a, weight_b, config.max_gross_exposure);
                    let target_a = target_shares(weight_a, equity, price_a, config.fractional_shares);
                    let target_b = target_shares(weight_b, equity, price_b, config.fractional_shares);
                    fills = ledger.rebalance(
                        row.date,
                        (target_a - ledger.holdings_a(), price_a),
                        (target_b - ledger.holdings_b(), price_b),
                        &config.cost_model,
                    );
                }
                Err(e) => {
                    log::warn!(
                        "{pair}: policy '{}' failed on {}: {e}",
                        policy.name(),
                        row.date
                    );
                    ledger.mark_incomplete(PolicyFailure {
                        date: row.date,
                        message: e.to_string(),
                    });
                    return Ok(ledger);
                }
            }
        }

        ledger.append(row.date, price_a, price_b, fills > 0)?;
    }

    log::debug!(
        "{pair}: {} days, {} fills, final equity {:.2}",
        ledger.entries().len(),
        ledger.fills().len(),
        ledger.last_equity()
    );
    Ok(ledger)
}

fn check_action(action: Action) -> Result<Action, PolicyError> {
    match action {
        Action::Target { weight_a, weight_b } if !(weight_a.is_finite() && weight_b.is_finite()) => {
            Err(PolicyError::new(format!(
                "non-finite target weights ({weight_a}, {weight_b})"
            )))
        }
        other => Ok(other),
    }
}

/// Scale both weights down so |w_a| + |w_b| <= max_gross.
fn cap_gross(weight_a: f64, weight_b: f64, max_gross: f64) -> (f64, f64) {
    let gross = weight_a.abs() + weight_b.abs();
    if gross > max_gross {
        let scale = max_gross / gross;
        (weight_a * scale, weight_b * scale)
    } else {
        (weight_a, weight_b)
    }
}

fn target_shares(weight: f64, equity: f64, price: f64, fractional: bool) -> f64 {
    if equity <= 0.0 || price <= 0.0 || weight == 0.0 {
        return 0.0;
    }
    let shares = weight * equity / price;
    if fractional {
        shares
    } else {
        shares.trunc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClusterId;
    use crate::engine::{CostModel, FnPolicy, LedgerStatus, TradeFrequency};
    use std::sync::atomic::AtomicUsize;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(id: &str, closes: &[f64]) -> TimeSeries {
        TimeSeries::from_closes(
            id.into(),
            closes.iter().enumerate().map(|(i, &c)| (d(i as u32 + 1), c)),
        )
        .unwrap()
    }

    fn pair() -> Pair {
        Pair::new("A".into(), "B".into(), ClusterId(0), 1.0).unwrap()
    }

    fn constant(weight_a: f64, weight_b: f64) -> impl Policy {
        FnPolicy::new("constant", move |_: &Observation<'_>| {
            Ok(Action::Target { weight_a, weight_b })
        })
    }

    #[test]
    fn hold_policy_keeps_capital() {
        let a = series("A", &[10.0, 11.0, 9.0]);
        let b = series("B", &[20.0, 19.0, 21.0]);
        let hold = FnPolicy::new("hold", |_: &Observation<'_>| Ok(Action::Hold));
        let ledger = simulate(&pair(), &a, &b, &hold, &SimulationConfig::default(), None).unwrap();
        assert_eq!(ledger.entries().len(), 3);
        assert!(ledger.fills().is_empty());
        assert!(ledger.entries().iter().all(|e| e.equity() == 1000.0));
        assert!(ledger.is_complete());
    }

    #[test]
    fn full_long_tracks_leg_a() {
        let a = series("A", &[100.0, 110.0, 90.0]);
        let b = series("B", &[50.0, 50.0, 50.0]);
        let ledger = simulate(
            &pair(),
            &a,
            &b,
            &constant(1.0, 0.0),
            &SimulationConfig::default(),
            None,
        )
        .unwrap();
        let equity: Vec<f64> = ledger.equity_curve();
        assert_eq!(equity, vec![1000.0, 1100.0, 900.0]);
        assert_eq!(ledger.holdings_a(), 10.0);
        assert_eq!(ledger.fills().len(), 1);
    }

    #[test]
    fn gross_exposure_is_capped() {
        let a = series("A", &[10.0]);
        let b = series("B", &[10.0]);
        let ledger = simulate(
            &pair(),
            &a,
            &b,
            &constant(1.5, -1.5),
            &SimulationConfig::default(),
            None,
        )
        .unwrap();
        // scaled to (0.5, -0.5): 50 shares each way
        assert_eq!(ledger.holdings_a(), 50.0);
        assert_eq!(ledger.holdings_b(), -50.0);
    }

    #[test]
    fn shares_truncate_unless_fractional() {
        let a = series("A", &[30.0]);
        let b = series("B", &[10.0]);
        let whole = simulate(&pair(), &a, &b, &constant(1.0, 0.0), &SimulationConfig::default(), None)
            .unwrap();
        assert_eq!(whole.holdings_a(), 33.0);

        let config = SimulationConfig::default().with_fractional_shares(true);
        let frac = simulate(&pair(), &a, &b, &constant(1.0, 0.0), &config, None).unwrap();
        assert!((frac.holdings_a() - 1000.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn policy_queried_only_on_cadence_days() {
        let a = series("A", &[10.0; 7]);
        let b = series("B", &[10.0; 7]);
        let calls = AtomicUsize::new(0);
        let counting = FnPolicy::new("count", |_: &Observation<'_>| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(Action::Hold)
        });
        let config = SimulationConfig::default().with_frequency(TradeFrequency::EveryNDays(3));
        let ledger = simulate(&pair(), &a, &b, &counting, &config, None).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(ledger.entries().len(), 7);
    }

    #[test]
    fn history_window_ends_today() {
        let a = series("A", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = series("B", &[1.0; 5]);
        let checker = FnPolicy::new("check", |obs: &Observation<'_>| {
            let last = obs.history.last().map(|r| r.date);
            if last != Some(obs.date) || obs.history.len() > 2 {
                return Err(PolicyError::new("bad window"));
            }
            if obs.history.iter().any(|r| r.date > obs.date) {
                return Err(PolicyError::new("future row"));
            }
            Ok(Action::Hold)
        });
        let config = SimulationConfig::default().with_window_length(2);
        let ledger = simulate(&pair(), &a, &b, &checker, &config, None).unwrap();
        assert!(ledger.is_complete());
    }

    #[test]
    fn policy_error_marks_ledger_incomplete() {
        let a = series("A", &[10.0, 11.0, 12.0, 13.0]);
        let b = series("B", &[10.0; 4]);
        let failing = FnPolicy::new("fail", |obs: &Observation<'_>| {
            if obs.day_index == 2 {
                Err(PolicyError::new("model exploded"))
            } else {
                Ok(Action::Hold)
            }
        });
        let ledger =
            simulate(&pair(), &a, &b, &failing, &SimulationConfig::default(), None).unwrap();
        assert_eq!(ledger.entries().len(), 2);
        assert_eq!(ledger.last_entry().map(|e| e.date), Some(d(2)));
        match ledger.status() {
            LedgerStatus::Incomplete(failure) => {
                assert_eq!(failure.date, d(3));
                assert!(failure.message.contains("model exploded"));
            }
            other => panic!("expected incomplete, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_weights_are_policy_errors() {
        let a = series("A", &[10.0, 10.0]);
        let b = series("B", &[10.0, 10.0]);
        let ledger = simulate(
            &pair(),
            &a,
            &b,
            &constant(f64::NAN, 0.0),
            &SimulationConfig::default(),
            None,
        )
        .unwrap();
        assert!(!ledger.is_complete());
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn cancellation_drops_ledger() {
        let a = series("A", &[10.0, 10.0]);
        let b = series("B", &[10.0, 10.0]);
        let flag = AtomicBool::new(true);
        let err = simulate(
            &pair(),
            &a,
            &b,
            &constant(0.0, 0.0),
            &SimulationConfig::default(),
            Some(&flag),
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::Cancelled { .. }));
    }

    #[test]
    fn disjoint_series_are_alignment_errors() {
        let a = series("A", &[10.0, 10.0]);
        let b = TimeSeries::from_closes("B".into(), vec![(d(20), 1.0)]).unwrap();
        let err = simulate(
            &pair(),
            &a,
            &b,
            &constant(0.0, 0.0),
            &SimulationConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::Alignment(_)));
    }

    #[test]
    fn swapped_series_rejected() {
        let a = series("A", &[10.0]);
        let b = series("B", &[10.0]);
        let err = simulate(
            &pair(),
            &b,
            &a,
            &constant(0.0, 0.0),
            &SimulationConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::SeriesMismatch { .. }));
    }

    #[test]
    fn costs_only_when_configured() {
        let a = series("A", &[10.0, 10.0]);
        let b = series("B", &[10.0, 10.0]);
        let free = simulate(&pair(), &a, &b, &constant(0.5, -0.5), &SimulationConfig::default(), None)
            .unwrap();
        assert_eq!(free.last_equity(), 1000.0);

        let config = SimulationConfig::default().with_cost_model(CostModel::new(0.0, 10.0));
        let costly = simulate(&pair(), &a, &b, &constant(0.5, -0.5), &config, None).unwrap();
        // 50 shares each leg at 10 = 1000 notional, 10 bps = 1.0
        assert!((costly.entries()[0].equity() - 999.0).abs() < 1e-9);
        assert!(costly.commission_paid() >= 1.0);
    }

    #[test]
    fn void_bars_keep_previous_mark() {
        let a = series("A", &[10.0, f64::NAN, 12.0]);
        let b = series("B", &[10.0; 3]);
        let ledger = simulate(
            &pair(),
            &a,
            &b,
            &constant(1.0, 0.0),
            &SimulationConfig::default(),
            None,
        )
        .unwrap();
        let e = &ledger.entries()[1];
        assert_eq!(e.price_a, 10.0);
        assert_eq!(e.equity(), 1000.0);
    }
}
