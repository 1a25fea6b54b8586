//! CSV loading for latent vectors, per-instrument series, and the benchmark.
//!
//! File layouts:
//! - latents: `instrument[,window_start,window_end],<one column per dimension>`
//! - series: one `<INSTRUMENT>.csv` per instrument with
//!   `date,open,high,low,close,volume[,feature...]`; only `date` and `close`
//!   are required, missing price columns default to the close
//! - benchmark: `date,close`, converted to daily returns

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use pairlab_core::domain::{
    Bar, InstrumentId, LatentError, LatentSet, LatentVector, SeriesError, TimeSeries,
};

use crate::metrics::BenchmarkReturns;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{path}, line {line}: {message}")]
    Format {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("latent vectors in {path}: {source}")]
    Latent { path: PathBuf, source: LatentError },

    #[error("series in {path}: {source}")]
    Series { path: PathBuf, source: SeriesError },

    #[error("latent dimension {found} in {path} does not match configured {expected}")]
    Dimension {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

/// Series keyed by instrument.
pub type SeriesStore = BTreeMap<InstrumentId, TimeSeries>;

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn format_err(path: &Path, record: &csv::StringRecord, message: String) -> LoadError {
    LoadError::Format {
        path: path.to_path_buf(),
        line: record.position().map_or(0, |p| p.line()),
        message,
    }
}

fn parse_date(path: &Path, record: &csv::StringRecord, raw: &str) -> Result<NaiveDate, LoadError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| format_err(path, record, format!("bad date '{raw}': {e}")))
}

fn parse_f64(
    path: &Path,
    record: &csv::StringRecord,
    column: &str,
    raw: &str,
) -> Result<f64, LoadError> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|e| format_err(path, record, format!("bad {column} '{raw}': {e}")))
}

/// Load latent vectors. When `expected_dimension` is given, the file must match it.
pub fn load_latents(path: &Path, expected_dimension: Option<usize>) -> Result<LatentSet, LoadError> {
    let mut reader = open(path)?;
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let has_window = headers.get(1) == Some("window_start") && headers.get(2) == Some("window_end");
    let first_dim = if has_window { 3 } else { 1 };
    let dimension = headers.len().saturating_sub(first_dim);
    if let Some(expected) = expected_dimension {
        if dimension != expected {
            return Err(LoadError::Dimension {
                path: path.to_path_buf(),
                expected,
                found: dimension,
            });
        }
    }

    let mut vectors = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let id = record.get(0).unwrap_or_default();
        if id.is_empty() {
            return Err(format_err(path, &record, "missing instrument id".into()));
        }
        let values = (first_dim..record.len())
            .map(|i| {
                let column = headers.get(i).unwrap_or("dimension");
                parse_f64(path, &record, column, record.get(i).unwrap_or_default())
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let mut vector = LatentVector::new(id, values);
        if has_window {
            let start = parse_date(path, &record, record.get(1).unwrap_or_default())?;
            let end = parse_date(path, &record, record.get(2).unwrap_or_default())?;
            vector = vector.with_window(start, end);
        }
        vectors.push(vector);
    }

    let set = LatentSet::new(vectors).map_err(|source| LoadError::Latent {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!(
        "loaded {} latent vectors of dimension {} from {}",
        set.len(),
        set.dimension(),
        path.display()
    );
    Ok(set)
}

/// Load one instrument's series from a CSV file.
pub fn load_series(path: &Path, instrument: InstrumentId) -> Result<TimeSeries, LoadError> {
    let mut reader = open(path)?;
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let index = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (Some(date_col), Some(close_col)) = (index("date"), index("close")) else {
        return Err(LoadError::Format {
            path: path.to_path_buf(),
            line: 1,
            message: "header must contain 'date' and 'close'".into(),
        });
    };
    let open_col = index("open");
    let high_col = index("high");
    let low_col = index("low");
    let volume_col = index("volume");
    let known = [Some(date_col), Some(close_col), open_col, high_col, low_col, volume_col];
    let feature_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !known.contains(&Some(*i)))
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut bars = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let field = |i: usize| record.get(i).unwrap_or_default();
        let date = parse_date(path, &record, field(date_col))?;
        let close = parse_f64(path, &record, "close", field(close_col))?;
        let column_or_close = |col: Option<usize>, name: &str| match col {
            Some(i) => parse_f64(path, &record, name, field(i)),
            None => Ok(close),
        };

        let mut bar = Bar::from_close(date, close);
        bar.open = column_or_close(open_col, "open")?;
        bar.high = column_or_close(high_col, "high")?;
        bar.low = column_or_close(low_col, "low")?;
        bar.volume = match volume_col {
            Some(i) => parse_f64(path, &record, "volume", field(i))?,
            None => 0.0,
        };
        for (i, name) in &feature_cols {
            bar.features
                .insert(name.clone(), parse_f64(path, &record, name, field(*i))?);
        }
        bars.push(bar);
    }

    TimeSeries::new(instrument, bars).map_err(|source| LoadError::Series {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<dir>/<ID>.csv` for each requested instrument. Instruments without a
/// file are left out of the store; the caller decides what that means.
pub fn load_series_dir<'a>(
    dir: &Path,
    instruments: impl IntoIterator<Item = &'a InstrumentId>,
) -> Result<SeriesStore, LoadError> {
    let mut store = SeriesStore::new();
    let mut missing = 0usize;
    for id in instruments {
        if store.contains_key(id) {
            continue;
        }
        let path = dir.join(format!("{id}.csv"));
        if !path.is_file() {
            log::warn!("no series file for {id} at {}", path.display());
            missing += 1;
            continue;
        }
        let series = load_series(&path, id.clone())?;
        log::debug!("loaded {} bars for {id}", series.len());
        store.insert(id.clone(), series);
    }
    log::info!(
        "loaded {} series from {} ({missing} missing)",
        store.len(),
        dir.display()
    );
    Ok(store)
}

/// Load benchmark closes and convert them to daily returns keyed by date.
pub fn load_benchmark(path: &Path) -> Result<BenchmarkReturns, LoadError> {
    let series = load_series(path, InstrumentId::new("BENCHMARK"))?;
    Ok(benchmark_returns(
        series.bars().iter().map(|b| (b.date, b.close)),
    ))
}

/// Daily returns from date-ordered closes.
///
/// The first date has no return. Non-positive previous closes give 0.
pub fn benchmark_returns(closes: impl IntoIterator<Item = (NaiveDate, f64)>) -> BenchmarkReturns {
    let (dates, closes): (Vec<NaiveDate>, Vec<f64>) = closes.into_iter().unzip();
    let returns = crate::metrics::daily_returns(&closes);
    dates.into_iter().skip(1).zip(returns).collect()
}
