//! Two-leg time alignment.
//!
//! Given the series of both legs of a pair, build a common daily timeline:
//! the union of both legs' dates, cut at the last date the legs share. A leg
//! missing a bar on some date carries its last known bar forward (flagged as
//! stale). Leading dates before both legs have any data are dropped, so every
//! aligned row has a bar for each leg.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::{Bar, InstrumentId, TimeSeries};

#[derive(Debug, Error, PartialEq)]
#[error("alignment error: {instrument_a} and {instrument_b} share no dates")]
pub struct AlignmentError {
    pub instrument_a: InstrumentId,
    pub instrument_b: InstrumentId,
}

/// One day of the aligned timeline. Bars are dated on or before `date`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedRow<'a> {
    pub date: NaiveDate,
    pub a: &'a Bar,
    pub b: &'a Bar,
    /// True when leg A had no bar on `date` and `a` is carried forward.
    pub a_stale: bool,
    pub b_stale: bool,
}

/// Aligned view over the two legs of a pair.
#[derive(Debug, Clone)]
pub struct AlignedPair<'a> {
    pub rows: Vec<AlignedRow<'a>>,
    /// Leading dates dropped because one leg had no data yet.
    pub skipped: Vec<NaiveDate>,
}

impl<'a> AlignedPair<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }
}

/// Align two legs onto a common timeline.
pub fn align_pair<'a>(
    series_a: &'a TimeSeries,
    series_b: &'a TimeSeries,
) -> Result<AlignedPair<'a>, AlignmentError> {
    let dates_a: BTreeSet<NaiveDate> = series_a.dates().collect();
    let last_common = series_b
        .dates()
        .filter(|d| dates_a.contains(d))
        .max()
        .ok_or_else(|| AlignmentError {
            instrument_a: series_a.instrument().clone(),
            instrument_b: series_b.instrument().clone(),
        })?;

    let timeline: BTreeSet<NaiveDate> = series_a
        .dates()
        .chain(series_b.dates())
        .filter(|d| *d <= last_common)
        .collect();

    let bars_a = series_a.bars();
    let bars_b = series_b.bars();
    let (mut ia, mut ib) = (0usize, 0usize);
    let mut last_a: Option<&'a Bar> = None;
    let mut last_b: Option<&'a Bar> = None;

    let mut rows = Vec::with_capacity(timeline.len());
    let mut skipped = Vec::new();

    for date in timeline {
        let mut a_fresh = false;
        while ia < bars_a.len() && bars_a[ia].date <= date {
            last_a = Some(&bars_a[ia]);
            a_fresh = bars_a[ia].date == date;
            ia += 1;
        }
        let mut b_fresh = false;
        while ib < bars_b.len() && bars_b[ib].date <= date {
            last_b = Some(&bars_b[ib]);
            b_fresh = bars_b[ib].date == date;
            ib += 1;
        }

        match (last_a, last_b) {
            (Some(a), Some(b)) => rows.push(AlignedRow {
                date,
                a,
                b,
                a_stale: !a_fresh,
                b_stale: !b_fresh,
            }),
            _ => skipped.push(date),
        }
    }

    Ok(AlignedPair { rows, skipped })
}
