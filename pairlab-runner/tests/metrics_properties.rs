//! Property tests for the metrics layer.
//!
//! 1. Simulated ledgers under arbitrary targets never yield NaN statistics
//! 2. Drawdown of a positive equity curve lies in [-1, 0]

use chrono::NaiveDate;
use proptest::prelude::*;

use pairlab_core::domain::{Bar, ClusterId, Pair, TimeSeries};
use pairlab_core::engine::{simulate, Action, CostModel, FnPolicy, Observation, SimulationConfig};
use pairlab_runner::metrics::max_drawdown;
use pairlab_runner::{compute_metrics, BenchmarkReturns};

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 3, 1).unwrap()
}

fn series(id: &str, closes: &[f64]) -> TimeSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::from_close(base() + chrono::Duration::days(i as i64), c))
        .collect();
    TimeSeries::new(id.into(), bars).unwrap()
}

fn pair() -> Pair {
    Pair::new("A".into(), "B".into(), ClusterId(0), 0.0).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ledger_metrics_are_never_nan(
        (prices_a, prices_b, weights, bench) in (2usize..40).prop_flat_map(|n| {
            (
                prop::collection::vec(5.0..200.0_f64, n),
                prop::collection::vec(5.0..200.0_f64, n),
                prop::collection::vec((-1.5..1.5_f64, -1.5..1.5_f64), n),
                prop::collection::vec(-0.05..0.05_f64, n),
            )
        }),
        slippage in 0.0..20.0_f64,
        risk_free in 0.0..0.1_f64,
    ) {
        let a = series("A", &prices_a);
        let b = series("B", &prices_b);
        let policy = FnPolicy::new("scripted", |obs: &Observation<'_>| {
            let (weight_a, weight_b) = weights[obs.day_index];
            Ok(Action::Target { weight_a, weight_b })
        });
        let config = SimulationConfig::default().with_cost_model(CostModel::new(slippage, 1.0));
        let ledger = simulate(&pair(), &a, &b, &policy, &config, None).unwrap();

        let benchmark: BenchmarkReturns = bench
            .iter()
            .enumerate()
            .map(|(i, &r)| (base() + chrono::Duration::days(i as i64), r))
            .collect();
        let m = compute_metrics(&ledger, &benchmark, risk_free);

        for (name, value) in m.as_map() {
            prop_assert!(!value.is_nan(), "{} is NaN", name);
        }
        prop_assert!(m.sharpe.is_finite());
        prop_assert!(m.sortino.is_finite());
        prop_assert!(m.max_drawdown <= 0.0);
        prop_assert_eq!(m.days, prices_a.len());
    }

    #[test]
    fn drawdown_of_positive_curve_is_bounded(
        curve in prop::collection::vec(0.01..1_000_000.0_f64, 0..60),
    ) {
        let dd = max_drawdown(&curve);
        prop_assert!((-1.0..=0.0).contains(&dd));
    }
}
