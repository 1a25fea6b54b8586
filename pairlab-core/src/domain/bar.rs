//! Bar: the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Daily OHLCV bar for a single instrument, plus engineered features.
///
/// Features are produced upstream (technical indicators, fundamental ratios)
/// and passed through opaquely to the policy. `BTreeMap` keeps the feature
/// order deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

impl Bar {
    /// A bar with all prices equal to `close` and no features.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
            features: BTreeMap::new(),
        }
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// A bar can be used as a mark price only when its close is finite and positive.
    pub fn is_markable(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}
