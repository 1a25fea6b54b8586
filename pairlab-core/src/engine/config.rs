//! Simulation configuration: immutable for the duration of a run.

use serde::{Deserialize, Serialize};

use super::cost_model::CostModel;
use super::frequency::TradeFrequency;

/// Configuration for one pair simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    /// Cadence on which the policy is queried.
    pub frequency: TradeFrequency,
    pub cost_model: CostModel,
    /// Allow non-integer share counts. When false, targets truncate toward zero.
    pub fractional_shares: bool,
    /// Cap on |weight_a| + |weight_b|; larger targets are scaled down.
    pub max_gross_exposure: f64,
    /// Rows of aligned history handed to the policy, including today.
    pub window_length: usize,
}

impl SimulationConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            frequency: TradeFrequency::Daily,
            cost_model: CostModel::frictionless(),
            fractional_shares: false,
            max_gross_exposure: 1.0,
            window_length: 60,
        }
    }

    pub fn with_frequency(mut self, frequency: TradeFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_fractional_shares(mut self, fractional: bool) -> Self {
        self.fractional_shares = fractional;
        self
    }

    pub fn with_max_gross_exposure(mut self, max_gross_exposure: f64) -> Self {
        self.max_gross_exposure = max_gross_exposure;
        self
    }

    pub fn with_window_length(mut self, window_length: usize) -> Self {
        self.window_length = window_length;
        self
    }

    /// Check the configuration is usable. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            ));
        }
        if !(self.max_gross_exposure.is_finite() && self.max_gross_exposure > 0.0) {
            return Err(format!(
                "max_gross_exposure must be positive, got {}",
                self.max_gross_exposure
            ));
        }
        let cm = &self.cost_model;
        if !(cm.commission_bps >= 0.0 && cm.slippage_bps >= 0.0) {
            return Err(format!(
                "costs must be non-negative, got commission {} bps, slippage {} bps",
                cm.commission_bps, cm.slippage_bps
            ));
        }
        if self.window_length == 0 {
            return Err("window_length must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SimulationConfig::default();
        assert_eq!(c.initial_capital, 1000.0);
        assert_eq!(c.frequency, TradeFrequency::Daily);
        assert!(c.cost_model.is_frictionless());
        assert!(!c.fractional_shares);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(SimulationConfig::new(0.0).validate().is_err());
        assert!(SimulationConfig::new(f64::NAN).validate().is_err());
        assert!(SimulationConfig::default()
            .with_cost_model(CostModel::new(0.0, -1.0))
            .validate()
            .is_err());
        assert!(SimulationConfig::default()
            .with_max_gross_exposure(0.0)
            .validate()
            .is_err());
        assert!(SimulationConfig::default()
            .with_window_length(0)
            .validate()
            .is_err());
    }
}
