//! Latent vectors: per-instrument embeddings produced by an external encoder.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::InstrumentId;

#[derive(Debug, Error, PartialEq)]
pub enum LatentError {
    #[error("{instrument}: latent dimension {found}, expected {expected}")]
    DimensionMismatch {
        instrument: InstrumentId,
        expected: usize,
        found: usize,
    },

    #[error("{instrument}: non-finite latent component at index {index}")]
    NonFinite { instrument: InstrumentId, index: usize },

    #[error("{0}: duplicate latent vector")]
    Duplicate(InstrumentId),

    #[error("{0}: empty latent vector")]
    Empty(InstrumentId),
}

/// The window of history a latent vector summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatentWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One instrument's embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentVector {
    pub instrument: InstrumentId,
    pub values: Vec<f64>,
    pub window: Option<LatentWindow>,
}

impl LatentVector {
    pub fn new(instrument: impl Into<InstrumentId>, values: Vec<f64>) -> Self {
        Self {
            instrument: instrument.into(),
            values,
            window: None,
        }
    }

    pub fn with_window(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.window = Some(LatentWindow { start, end });
        self
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Validated, immutable set of latent vectors keyed by instrument.
///
/// Every vector has the same dimension and only finite components. Iteration
/// order is the instrument order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatentSet {
    dimension: usize,
    vectors: BTreeMap<InstrumentId, LatentVector>,
}

impl LatentSet {
    pub fn new(vectors: impl IntoIterator<Item = LatentVector>) -> Result<Self, LatentError> {
        let mut map = BTreeMap::new();
        let mut dimension: Option<usize> = None;

        for v in vectors {
            if v.values.is_empty() {
                return Err(LatentError::Empty(v.instrument));
            }
            if let Some(index) = v.values.iter().position(|x| !x.is_finite()) {
                return Err(LatentError::NonFinite {
                    instrument: v.instrument,
                    index,
                });
            }
            match dimension {
                None => dimension = Some(v.dimension()),
                Some(expected) if expected != v.dimension() => {
                    let found = v.dimension();
                    return Err(LatentError::DimensionMismatch {
                        instrument: v.instrument,
                        expected,
                        found,
                    });
                }
                Some(_) => {}
            }
            if map.contains_key(&v.instrument) {
                return Err(LatentError::Duplicate(v.instrument));
            }
            map.insert(v.instrument.clone(), v);
        }

        Ok(Self {
            dimension: dimension.unwrap_or(0),
            vectors: map,
        })
    }

    /// Convenience constructor from `(id, values)` tuples.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, LatentError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<InstrumentId>,
    {
        Self::new(pairs.into_iter().map(|(id, values)| LatentVector::new(id, values)))
    }

    /// Common dimension (0 for an empty set).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, id: &InstrumentId) -> Option<&LatentVector> {
        self.vectors.get(id)
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.vectors.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LatentVector> {
        self.vectors.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &InstrumentId> {
        self.vectors.keys()
    }
}
