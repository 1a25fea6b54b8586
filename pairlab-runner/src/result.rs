//! Per-pair results and the aggregated results table.

use serde::{Deserialize, Serialize};
use std::fmt;

use pairlab_core::domain::{ClusterId, InstrumentId, Pair};
use pairlab_core::engine::LedgerStatus;
use pairlab_core::Ledger;

use crate::config::RunId;
use crate::metrics::MetricsReport;

/// Outcome of one pair's simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// Simulated over every aligned day.
    Complete,
    /// Stopped early: policy failure, alignment failure, or cancellation.
    Incomplete,
    /// Never simulated: missing series or policy construction failure.
    Error,
}

impl fmt::Display for PairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairStatus::Complete => "complete",
            PairStatus::Incomplete => "incomplete",
            PairStatus::Error => "error",
        };
        f.pad(s)
    }
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub instrument_a: InstrumentId,
    pub instrument_b: InstrumentId,
    pub cluster_id: ClusterId,
    pub distance: f64,
    pub status: PairStatus,
    /// Why the pair is not complete; empty otherwise.
    pub message: String,
    pub initial_capital: f64,
    pub final_value: f64,
    pub metrics: MetricsReport,
}

impl PairReport {
    /// Report for a simulated ledger. The status follows the ledger's.
    pub fn from_ledger(ledger: &Ledger, metrics: MetricsReport) -> Self {
        let (status, message) = match ledger.status() {
            LedgerStatus::Complete => (PairStatus::Complete, String::new()),
            LedgerStatus::Incomplete(failure) => (
                PairStatus::Incomplete,
                format!("policy failed on {}: {}", failure.date, failure.message),
            ),
        };
        Self::base(ledger.pair(), status, message, ledger.initial_capital())
            .with_final_value(ledger.last_equity())
            .with_metrics(metrics)
    }

    /// Report for a pair without a ledger.
    pub fn failed(
        pair: &Pair,
        status: PairStatus,
        message: impl Into<String>,
        initial_capital: f64,
    ) -> Self {
        Self::base(pair, status, message.into(), initial_capital)
    }

    fn base(pair: &Pair, status: PairStatus, message: String, initial_capital: f64) -> Self {
        Self {
            instrument_a: pair.instrument_a.clone(),
            instrument_b: pair.instrument_b.clone(),
            cluster_id: pair.cluster_id,
            distance: pair.distance,
            status,
            message,
            initial_capital,
            final_value: initial_capital,
            metrics: MetricsReport::default(),
        }
    }

    fn with_final_value(mut self, final_value: f64) -> Self {
        self.final_value = final_value;
        self
    }

    fn with_metrics(mut self, metrics: MetricsReport) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn label(&self) -> String {
        format!("{}_{}", self.instrument_a, self.instrument_b)
    }
}

/// Status counts across a results table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub complete: usize,
    pub incomplete: usize,
    pub error: usize,
}

/// Final results: one row per selected pair, in pair order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub run_id: RunId,
    pub rows: Vec<PairReport>,
}

impl ResultsTable {
    pub fn new(run_id: RunId, rows: Vec<PairReport>) -> Self {
        Self { run_id, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        self.rows
            .iter()
            .fold(StatusCounts::default(), |mut acc, row| {
                match row.status {
                    PairStatus::Complete => acc.complete += 1,
                    PairStatus::Incomplete => acc.incomplete += 1,
                    PairStatus::Error => acc.error += 1,
                }
                acc
            })
    }

    /// Complete rows ordered by Sharpe, best first. Ties keep pair order.
    pub fn ranked_by_sharpe(&self) -> Vec<&PairReport> {
        let mut rows: Vec<&PairReport> = self
            .rows
            .iter()
            .filter(|r| r.status == PairStatus::Complete)
            .collect();
        rows.sort_by(|a, b| b.metrics.sharpe.total_cmp(&a.metrics.sharpe));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str) -> Pair {
        Pair::new(a.into(), b.into(), ClusterId(1), 0.5).unwrap()
    }

    fn row(a: &str, b: &str, status: PairStatus, sharpe: f64) -> PairReport {
        let mut r = PairReport::failed(&pair(a, b), status, "", 1000.0);
        r.metrics.sharpe = sharpe;
        r
    }

    #[test]
    fn failed_report_keeps_capital() {
        let r = PairReport::failed(&pair("B", "A"), PairStatus::Error, "no series", 500.0);
        assert_eq!(r.instrument_a.as_str(), "A");
        assert_eq!(r.final_value, 500.0);
        assert_eq!(r.metrics, MetricsReport::default());
        assert_eq!(r.label(), "A_B");
    }

    #[test]
    fn counts_by_status() {
        let table = ResultsTable::new(
            "run".into(),
            vec![
                row("A", "B", PairStatus::Complete, 1.0),
                row("A", "C", PairStatus::Incomplete, 0.0),
                row("B", "C", PairStatus::Error, 0.0),
                row("C", "D", PairStatus::Complete, 2.0),
            ],
        );
        assert_eq!(
            table.counts(),
            StatusCounts {
                complete: 2,
                incomplete: 1,
                error: 1
            }
        );
    }

    #[test]
    fn ranking_skips_non_complete() {
        let table = ResultsTable::new(
            "run".into(),
            vec![
                row("A", "B", PairStatus::Complete, 0.5),
                row("A", "C", PairStatus::Incomplete, 9.0),
                row("C", "D", PairStatus::Complete, 1.5),
            ],
        );
        let labels: Vec<String> = table.ranked_by_sharpe().iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["C_D", "A_B"]);
    }

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(PairStatus::Incomplete.to_string(), "incomplete");
        assert_eq!(
            serde_json::to_string(&PairStatus::Error).unwrap(),
            "\"error\""
        );
    }
}
