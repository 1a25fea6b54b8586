//! Per-instrument date-ordered bar series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Bar, InstrumentId};

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("{instrument}: duplicate bar for {date}")]
    DuplicateDate {
        instrument: InstrumentId,
        date: NaiveDate,
    },
}

/// Ordered sequence of daily bars for one instrument.
///
/// Dates are strictly increasing; construction sorts the input and rejects
/// duplicate dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    instrument: InstrumentId,
    bars: Vec<Bar>,
}

impl TimeSeries {
    pub fn new(instrument: InstrumentId, mut bars: Vec<Bar>) -> Result<Self, SeriesError> {
        bars.sort_by_key(|b| b.date);
        if let Some(w) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate {
                instrument,
                date: w[0].date,
            });
        }
        Ok(Self { instrument, bars })
    }

    /// Build a close-only series, one bar per `(date, close)`.
    pub fn from_closes(
        instrument: InstrumentId,
        closes: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, SeriesError> {
        let bars = closes
            .into_iter()
            .map(|(date, close)| Bar::from_close(date, close))
            .collect();
        Self::new(instrument, bars)
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    /// Bar dated exactly `date`, if present.
    pub fn get(&self, date: NaiveDate) -> Option<&Bar> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|i| &self.bars[i])
    }
}
