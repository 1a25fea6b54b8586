//! Built-in reference policies.
//!
//! Learned policies live outside this crate; these exist so the pipeline can
//! run end to end and so the engine has known behavior to test against.

use serde::{Deserialize, Serialize};

use crate::engine::{Action, Observation, Policy, PolicyError};

/// Never trades. The ledger stays all cash.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralPolicy;

impl Policy for NeutralPolicy {
    fn name(&self) -> &str {
        "neutral"
    }

    fn decide(&self, _observation: &Observation<'_>) -> Result<Action, PolicyError> {
        Ok(Action::Hold)
    }
}

/// Rebalances to the same signed weights on every trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedWeights {
    pub weight_a: f64,
    pub weight_b: f64,
}

impl FixedWeights {
    pub fn new(weight_a: f64, weight_b: f64) -> Self {
        Self { weight_a, weight_b }
    }
}

impl Policy for FixedWeights {
    fn name(&self) -> &str {
        "fixed_weights"
    }

    fn decide(&self, _observation: &Observation<'_>) -> Result<Action, PolicyError> {
        Ok(Action::Target {
            weight_a: self.weight_a,
            weight_b: self.weight_b,
        })
    }
}

/// Mean reversion on the log-price spread `ln(a) - ln(b)`.
///
/// The z-score of today's spread against the observation window drives the
/// position: above `entry_z` short A / long B, below `-entry_z` the reverse,
/// back inside `exit_z` go flat. In between, hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadReversion {
    pub entry_z: f64,
    pub exit_z: f64,
    /// Absolute weight per leg when positioned.
    pub leg_weight: f64,
    /// Rows required before the first signal.
    pub min_history: usize,
}

impl Default for SpreadReversion {
    fn default() -> Self {
        Self {
            entry_z: 2.0,
            exit_z: 0.5,
            leg_weight: 0.5,
            min_history: 20,
        }
    }
}

impl SpreadReversion {
    pub fn new(entry_z: f64, exit_z: f64) -> Self {
        Self {
            entry_z,
            exit_z,
            ..Self::default()
        }
    }

    pub fn with_leg_weight(mut self, leg_weight: f64) -> Self {
        self.leg_weight = leg_weight;
        self
    }

    pub fn with_min_history(mut self, min_history: usize) -> Self {
        self.min_history = min_history;
        self
    }

    /// Z-score of the latest spread over the window, if computable.
    fn zscore(observation: &Observation<'_>) -> Option<f64> {
        let spreads: Vec<f64> = observation
            .history
            .iter()
            .filter(|r| r.a.is_markable() && r.b.is_markable())
            .map(|r| r.a.close.ln() - r.b.close.ln())
            .collect();
        let today = *spreads.last()?;
        let n = spreads.len();
        if n < 2 {
            return None;
        }
        let mean = spreads.iter().sum::<f64>() / n as f64;
        let var = spreads.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let std = var.sqrt();
        if std < 1e-12 {
            return None;
        }
        Some((today - mean) / std)
    }
}

impl Policy for SpreadReversion {
    fn name(&self) -> &str {
        "spread_reversion"
    }

    fn decide(&self, observation: &Observation<'_>) -> Result<Action, PolicyError> {
        if observation.history.len() < self.min_history.max(2) {
            return Ok(Action::Hold);
        }
        let Some(z) = Self::zscore(observation) else {
            return Ok(Action::Hold);
        };

        let w = self.leg_weight;
        let action = if z > self.entry_z {
            Action::Target {
                weight_a: -w,
                weight_b: w,
            }
        } else if z < -self.entry_z {
            Action::Target {
                weight_a: w,
                weight_b: -w,
            }
        } else if z.abs() < self.exit_z && !observation.position.is_flat() {
            Action::flat()
        } else {
            Action::Hold
        };
        Ok(action)
    }
}
