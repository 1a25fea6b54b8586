//! Performance metrics: pure functions that reduce a ledger to statistics.
//!
//! Every metric is a pure function: daily returns and/or an equity curve in,
//! scalar out. [`compute_metrics`] assembles them into a [`MetricsReport`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pairlab_core::Ledger;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Benchmark daily returns keyed by date.
pub type BenchmarkReturns = BTreeMap<NaiveDate, f64>;

/// Scalar statistics for one pair's ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub total_pnl: f64,
    pub total_return: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Negative fraction, e.g. -0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    /// Annualized OLS intercept against the benchmark.
    pub alpha: f64,
    pub beta: f64,
    /// Number of leg fills.
    pub trade_count: usize,
    /// Ledger entries the report covers.
    pub days: usize,
}

impl MetricsReport {
    /// Metrics keyed by name, in a fixed order.
    pub fn as_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("total_pnl", self.total_pnl),
            ("total_return", self.total_return),
            ("annual_return", self.annual_return),
            ("annual_volatility", self.annual_volatility),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("calmar", self.calmar),
            ("max_drawdown", self.max_drawdown),
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("trade_count", self.trade_count as f64),
        ])
    }
}

/// Compute all metrics for a ledger.
///
/// Ledgers with fewer than two entries produce an all-zero report.
/// `risk_free_rate` is annual.
pub fn compute_metrics(
    ledger: &Ledger,
    benchmark: &BenchmarkReturns,
    risk_free_rate: f64,
) -> MetricsReport {
    let entries = ledger.entries();
    if entries.len() < 2 {
        return MetricsReport::default();
    }

    let returns = ledger.daily_returns();
    let mut equity_curve = Vec::with_capacity(entries.len() + 1);
    equity_curve.push(ledger.initial_capital());
    equity_curve.extend(ledger.equity_curve());

    let annual = annual_return(&returns);
    let dd = max_drawdown(&equity_curve);
    let paired: Vec<(f64, f64)> = entries
        .iter()
        .filter_map(|e| benchmark.get(&e.date).map(|&b| (e.daily_return, b)))
        .collect();
    let (alpha, beta) = alpha_beta(&paired);

    MetricsReport {
        total_pnl: ledger.last_equity() - ledger.initial_capital(),
        total_return: total_return(&equity_curve),
        annual_return: annual,
        annual_volatility: annual_volatility(&returns),
        sharpe: sharpe_ratio(&returns, risk_free_rate),
        sortino: sortino_ratio(&returns, risk_free_rate),
        calmar: calmar_ratio(annual, dd),
        max_drawdown: dd,
        alpha,
        beta,
        trade_count: ledger.fills().len(),
        days: entries.len(),
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    (final_eq - initial) / initial
}

/// Compounded daily returns annualized over 252 days: `(Π(1+r))^(252/n) - 1`.
///
/// Returns -1.0 when compounded growth is non-positive (capital wiped out).
pub fn annual_return(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS / returns.len() as f64) - 1.0
}

/// Sample standard deviation of daily returns scaled by sqrt(252).
pub fn annual_volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS.sqrt()
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * TRADING_DAYS.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Sortino = mean(daily returns - rf) / downside_std * sqrt(252).
/// Returns 0.0 if there are no downside observations or fewer than 2 returns.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);

    let downside_sq: Vec<f64> = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();
    if downside_sq.is_empty() {
        return 0.0;
    }

    let downside_var = downside_sq.iter().sum::<f64>() / returns.len() as f64;
    let downside_std = downside_var.sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean / downside_std) * TRADING_DAYS.sqrt()
}

/// Calmar ratio: annual return / |max_drawdown|. Zero when there was no drawdown.
pub fn calmar_ratio(annual_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown >= 0.0 {
        return 0.0;
    }
    annual_return / max_drawdown.abs()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// OLS of strategy returns on benchmark returns over `(strategy, benchmark)`
/// samples. Returns `(alpha, beta)` with alpha annualized.
///
/// Both are zero with fewer than 2 samples or a constant benchmark.
pub fn alpha_beta(samples: &[(f64, f64)]) -> (f64, f64) {
    if samples.len() < 2 {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean_r = samples.iter().map(|s| s.0).sum::<f64>() / n;
    let mean_b = samples.iter().map(|s| s.1).sum::<f64>() / n;

    let (mut cov, mut var_b) = (0.0, 0.0);
    for &(r, b) in samples {
        cov += (r - mean_r) * (b - mean_b);
        var_b += (b - mean_b).powi(2);
    }
    if var_b < 1e-15 {
        return (0.0, 0.0);
    }
    let beta = cov / var_b;
    let alpha = (mean_r - beta * mean_b) * TRADING_DAYS;
    (alpha, beta)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive values. Non-positive bases give 0.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
