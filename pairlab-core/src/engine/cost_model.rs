//! Cost model: slippage and commission calculation.
//!
//! Slippage is directional: buyers pay more (higher price), sellers receive less (lower price).
//! Commission is symmetric per-side in basis points of traded notional.
//! Both default to zero; costs apply only when configured.

use serde::{Deserialize, Serialize};

/// Execution friction applied when a leg is rebalanced at the close.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostModel {
    /// Slippage in basis points, applied directionally.
    #[serde(default)]
    pub slippage_bps: f64,
    /// Commission in basis points per side.
    #[serde(default)]
    pub commission_bps: f64,
}

impl CostModel {
    pub fn new(slippage_bps: f64, commission_bps: f64) -> Self {
        Self {
            slippage_bps,
            commission_bps,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn is_frictionless(&self) -> bool {
        self.slippage_bps == 0.0 && self.commission_bps == 0.0
    }

    /// Fill price for a signed share delta (positive = buy).
    pub fn fill_price(&self, raw_price: f64, delta: f64) -> f64 {
        if self.slippage_bps == 0.0 || delta == 0.0 {
            return raw_price;
        }
        let slip = self.slippage_bps / 10_000.0;
        if delta > 0.0 {
            raw_price * (1.0 + slip)
        } else {
            raw_price * (1.0 - slip)
        }
    }

    /// Commission on a fill: |delta| * price * bps.
    pub fn commission(&self, fill_price: f64, delta: f64) -> f64 {
        if self.commission_bps == 0.0 {
            return 0.0;
        }
        delta.abs() * fill_price * self.commission_bps / 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_is_identity() {
        let cm = CostModel::frictionless();
        assert!(cm.is_frictionless());
        assert_eq!(cm.fill_price(100.0, 10.0), 100.0);
        assert_eq!(cm.commission(100.0, 10.0), 0.0);
    }

    #[test]
    fn slippage_is_directional() {
        let cm = CostModel::new(10.0, 0.0);
        assert!((cm.fill_price(100.0, 5.0) - 100.1).abs() < 1e-10);
        assert!((cm.fill_price(100.0, -5.0) - 99.9).abs() < 1e-10);
    }

    #[test]
    fn commission_on_notional() {
        let cm = CostModel::new(0.0, 5.0);
        // 10 shares * 100 = 1000 notional; 5 bps = 0.50
        assert!((cm.commission(100.0, -10.0) - 0.5).abs() < 1e-10);
    }
}
