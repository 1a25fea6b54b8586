//! Look-ahead contamination tests for the simulation engine.
//!
//! Invariant: no decision or ledger entry on day t may depend on data dated
//! after t.
//!
//! Method: simulate on a truncated series (days 0..60) and on the full series
//! where every later bar is poisoned with absurd prices. Assert the ledgers
//! agree on days 0..60 and that no observation ever contains a future row.

use chrono::NaiveDate;
use std::sync::Mutex;

use pairlab_core::domain::{Bar, ClusterId, Pair, TimeSeries};
use pairlab_core::engine::{simulate, Action, FnPolicy, Observation, SimulationConfig};
use pairlab_core::policies::SpreadReversion;
use pairlab_core::Policy;

const TRUNCATE: usize = 60;

/// Deterministic pseudo-random walk using a simple LCG.
fn make_closes(n: usize, salt: u64, poison_from: Option<usize>) -> Vec<f64> {
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let seed = (i as u64 ^ salt)
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let change = ((seed >> 33) % 200) as f64 / 100.0 - 1.0; // -1.0 to +1.0
            price = (price + change).max(10.0);
            match poison_from {
                Some(p) if i >= p => 1.0e9,
                _ => price,
            }
        })
        .collect()
}

fn series(id: &str, closes: &[f64]) -> TimeSeries {
    let base = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::from_close(base + chrono::Duration::days(i as i64), c))
        .collect();
    TimeSeries::new(id.into(), bars).unwrap()
}

fn pair() -> Pair {
    Pair::new("AAA".into(), "BBB".into(), ClusterId(0), 0.1).unwrap()
}

fn run(policy: &dyn Policy, len: usize, poison_from: Option<usize>) -> pairlab_core::Ledger {
    let a = series("AAA", &make_closes(len, 1, poison_from));
    let b = series("BBB", &make_closes(len, 2, poison_from));
    let config = SimulationConfig::default()
        .with_window_length(20)
        .with_fractional_shares(true);
    simulate(&pair(), &a, &b, policy, &config, None).unwrap()
}

#[test]
fn spread_reversion_ignores_poisoned_future() {
    let policy = SpreadReversion::new(1.0, 0.25).with_min_history(10);
    let truncated = run(&policy, TRUNCATE, None);
    let full = run(&policy, 200, Some(TRUNCATE));

    assert_eq!(truncated.entries().len(), TRUNCATE);
    assert_eq!(
        &full.entries()[..TRUNCATE],
        truncated.entries(),
        "entries before the poison date must not change"
    );
    let fills_before: Vec<_> = full
        .fills()
        .iter()
        .filter(|f| f.date <= truncated.entries()[TRUNCATE - 1].date)
        .cloned()
        .collect();
    assert_eq!(fills_before, truncated.fills());
}

#[test]
fn observations_never_contain_future_rows() {
    let seen: Mutex<Vec<(NaiveDate, usize, f64)>> = Mutex::new(Vec::new());
    {
        let recorder = FnPolicy::new("recorder", |obs: &Observation<'_>| {
            assert!(obs.history.iter().all(|r| r.date <= obs.date));
            assert_eq!(obs.history.last().map(|r| r.date), Some(obs.date));
            assert_eq!(obs.current.date, obs.date);
            let max_close = obs
                .history
                .iter()
                .map(|r| r.a.close.max(r.b.close))
                .fold(f64::MIN, f64::max);
            if let Ok(mut log) = seen.lock() {
                log.push((obs.date, obs.day_index, max_close));
            }
            Ok(Action::Hold)
        });
        run(&recorder, 200, Some(TRUNCATE));
    }

    let log = seen.into_inner().unwrap();
    assert_eq!(log.len(), 200);
    for (i, (_, day_index, max_close)) in log.iter().enumerate() {
        assert_eq!(*day_index, i);
        if i < TRUNCATE {
            assert!(*max_close < 1.0e9, "poisoned bar visible on day {i}");
        }
    }
}
