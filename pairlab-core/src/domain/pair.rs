//! Pair: two instruments from the same cluster, canonically ordered.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ClusterId, InstrumentId};

/// A candidate trading pair.
///
/// Invariant: `instrument_a < instrument_b`. Construct through [`Pair::new`],
/// which canonicalizes the order and refuses self-pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub instrument_a: InstrumentId,
    pub instrument_b: InstrumentId,
    pub cluster_id: ClusterId,
    pub distance: f64,
}

impl Pair {
    /// Returns `None` for a self-pair.
    pub fn new(
        x: InstrumentId,
        y: InstrumentId,
        cluster_id: ClusterId,
        distance: f64,
    ) -> Option<Self> {
        let (instrument_a, instrument_b) = match x.cmp(&y) {
            std::cmp::Ordering::Less => (x, y),
            std::cmp::Ordering::Greater => (y, x),
            std::cmp::Ordering::Equal => return None,
        };
        Some(Self {
            instrument_a,
            instrument_b,
            cluster_id,
            distance,
        })
    }

    /// Stable label, e.g. `AAPL_MSFT`. Used for file names and log lines.
    pub fn label(&self) -> String {
        format!("{}_{}", self.instrument_a, self.instrument_b)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (cluster {}, d={:.6})",
            self.instrument_a, self.instrument_b, self.cluster_id, self.distance
        )
    }
}
