//! Export: CSV tables, JSON manifest, and a Markdown summary.
//!
//! A run writes into `<output_dir>/<run id prefix>/`:
//! - `manifest.json`: config, run id, status counts
//! - `clusters.csv`: instrument to cluster assignment
//! - `pairs.csv`: selected pairs in rank order
//! - `results.csv`: one row per pair, every metric
//! - `ledgers/<A>_<B>.csv`: day-by-day ledger per simulated pair
//! - `summary.md`: human-readable overview
//!
//! The same config always maps to the same directory, so a rerun overwrites
//! its previous artifacts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pairlab_core::domain::{LatentSet, Pair, TimeSeries};
use pairlab_core::{Clustering, Ledger};

use crate::config::{PipelineConfig, RunId};
use crate::pipeline::PipelineOutput;
use crate::result::{ResultsTable, StatusCounts};
use crate::synthetic::SyntheticData;

/// Characters of the run id used for the output directory name.
pub const RUN_DIR_PREFIX: usize = 12;

const METRIC_COLUMNS: [&str; 11] = [
    "total_pnl",
    "total_return",
    "annual_return",
    "annual_volatility",
    "sharpe",
    "sortino",
    "calmar",
    "max_drawdown",
    "alpha",
    "beta",
    "trade_count",
];

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: RunId,
    pub generated_at: String,
    pub instruments: usize,
    pub clusters: usize,
    pub pairs: usize,
    pub counts: StatusCounts,
    pub config: PipelineConfig,
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Run tables ─────────────────────────────────────────────────────

pub fn export_clusters_csv(clustering: &Clustering) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["instrument", "cluster"])?;
    for (id, cluster) in &clustering.assignment {
        wtr.write_record([id.as_str(), &cluster.to_string()])?;
    }
    finish(wtr)
}

/// Pairs with their rank inside the cluster (1 = closest).
pub fn export_pairs_csv(pairs: &[Pair]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["cluster", "rank", "instrument_a", "instrument_b", "distance"])?;
    let mut rank = 0usize;
    let mut current = None;
    for pair in pairs {
        if current != Some(pair.cluster_id) {
            current = Some(pair.cluster_id);
            rank = 0;
        }
        rank += 1;
        wtr.write_record([
            &pair.cluster_id.to_string(),
            &rank.to_string(),
            pair.instrument_a.as_str(),
            pair.instrument_b.as_str(),
            &format!("{:.6}", pair.distance),
        ])?;
    }
    finish(wtr)
}

pub fn export_results_csv(table: &ResultsTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec![
        "instrument_a",
        "instrument_b",
        "cluster",
        "distance",
        "status",
        "initial_capital",
        "final_value",
    ];
    header.extend(METRIC_COLUMNS);
    header.push("message");
    wtr.write_record(&header)?;

    for row in &table.rows {
        let metrics = row.metrics.as_map();
        let mut record = vec![
            row.instrument_a.to_string(),
            row.instrument_b.to_string(),
            row.cluster_id.to_string(),
            format!("{:.6}", row.distance),
            row.status.to_string(),
            format!("{:.2}", row.initial_capital),
            format!("{:.2}", row.final_value),
        ];
        for column in METRIC_COLUMNS {
            let value = metrics.get(column).copied().unwrap_or(0.0);
            record.push(if column == "trade_count" {
                format!("{value:.0}")
            } else {
                format!("{value:.6}")
            });
        }
        record.push(row.message.clone());
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

pub fn export_ledger_csv(ledger: &Ledger) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "price_a",
        "price_b",
        "holdings_a",
        "holdings_b",
        "cash",
        "mark_value",
        "equity",
        "daily_return",
        "traded",
    ])?;
    for e in ledger.entries() {
        wtr.write_record([
            &e.date.to_string(),
            &format!("{:.6}", e.price_a),
            &format!("{:.6}", e.price_b),
            &format!("{:.6}", e.holdings_a),
            &format!("{:.6}", e.holdings_b),
            &format!("{:.6}", e.cash),
            &format!("{:.6}", e.mark_value),
            &format!("{:.6}", e.equity()),
            &format!("{:.8}", e.daily_return),
            &e.traded.to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── Markdown summary ───────────────────────────────────────────────

/// Markdown overview: status counts and the best pairs by Sharpe.
pub fn generate_summary(output: &PipelineOutput, top: usize) -> String {
    let table = &output.table;
    let counts = table.counts();
    let mut md = String::with_capacity(1024);

    md.push_str("# Pair Run Summary\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run | {} |\n", short_id(&table.run_id)));
    md.push_str(&format!(
        "| Clusters | {} |\n",
        output.clustering.clusters.len()
    ));
    md.push_str(&format!("| Pairs | {} |\n", output.pairs.len()));
    md.push_str(&format!(
        "| Status | {} complete, {} incomplete, {} error |\n",
        counts.complete, counts.incomplete, counts.error
    ));
    md.push('\n');

    let ranked = table.ranked_by_sharpe();
    if ranked.is_empty() {
        md.push_str("No complete pairs.\n");
        return md;
    }
    md.push_str("## Top Pairs\n\n");
    md.push_str("| Pair | Cluster | PnL | Sharpe | Sortino | Max DD | Trades |\n");
    md.push_str("| --- | --- | --- | --- | --- | --- | --- |\n");
    for row in ranked.into_iter().take(top) {
        let m = &row.metrics;
        md.push_str(&format!(
            "| {} | {} | {:.2} | {:.3} | {:.3} | {:.2}% | {} |\n",
            row.label(),
            row.cluster_id,
            m.total_pnl,
            m.sharpe,
            m.sortino,
            m.max_drawdown * 100.0,
            m.trade_count
        ));
    }
    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn short_id(run_id: &str) -> &str {
    &run_id[..RUN_DIR_PREFIX.min(run_id.len())]
}

/// Directory a run with this id writes into.
pub fn run_dir(output_dir: &Path, run_id: &str) -> PathBuf {
    output_dir.join(short_id(run_id))
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Save every artifact of a run. Returns the run directory.
pub fn save_run(
    output: &PipelineOutput,
    config: &PipelineConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dir = run_dir(output_dir, &output.table.run_id);
    let ledger_dir = dir.join("ledgers");
    std::fs::create_dir_all(&ledger_dir)
        .with_context(|| format!("failed to create artifact dir: {}", ledger_dir.display()))?;

    let manifest = Manifest {
        run_id: output.table.run_id.clone(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        instruments: output.clustering.assignment.len(),
        clusters: output.clustering.clusters.len(),
        pairs: output.pairs.len(),
        counts: output.table.counts(),
        config: config.clone(),
    };
    let json = serde_json::to_string_pretty(&manifest).context("failed to serialize manifest")?;
    write(&dir.join("manifest.json"), &json)?;

    write(&dir.join("clusters.csv"), &export_clusters_csv(&output.clustering)?)?;
    write(&dir.join("pairs.csv"), &export_pairs_csv(&output.pairs)?)?;
    write(&dir.join("results.csv"), &export_results_csv(&output.table)?)?;
    for ledger in &output.ledgers {
        let path = ledger_dir.join(format!("{}.csv", ledger.pair().label()));
        write(&path, &export_ledger_csv(ledger)?)?;
    }
    write(&dir.join("summary.md"), &generate_summary(output, 10))?;

    log::info!(
        "wrote {} results and {} ledgers to {}",
        output.table.len(),
        output.ledgers.len(),
        dir.display()
    );
    Ok(dir)
}

/// Load `manifest.json` from a run directory.
pub fn load_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}

// ─── Dataset export ─────────────────────────────────────────────────

pub fn export_latents_csv(latents: &LatentSet) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let with_window = latents.iter().all(|v| v.window.is_some());
    let mut header = vec!["instrument".to_string()];
    if with_window {
        header.push("window_start".into());
        header.push("window_end".into());
    }
    header.extend((0..latents.dimension()).map(|i| format!("z{i}")));
    wtr.write_record(&header)?;

    for v in latents.iter() {
        let mut record = vec![v.instrument.to_string()];
        if let (true, Some(w)) = (with_window, v.window) {
            record.push(w.start.to_string());
            record.push(w.end.to_string());
        }
        record.extend(v.values.iter().map(f64::to_string));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Full-precision series table. Feature columns are the union over all bars;
/// a bar without a feature leaves the cell empty.
pub fn export_series_csv(series: &TimeSeries) -> Result<String> {
    let features: BTreeSet<&str> = series
        .bars()
        .iter()
        .flat_map(|b| b.features.keys().map(String::as_str))
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["date", "open", "high", "low", "close", "volume"];
    header.extend(features.iter().copied());
    wtr.write_record(&header)?;

    for b in series.bars() {
        let mut record = vec![
            b.date.to_string(),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
        ];
        record.extend(
            features
                .iter()
                .map(|f| b.feature(f).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Write a synthetic dataset in the loader layout:
/// `latents.csv`, `series/<ID>.csv`, `benchmark.csv`.
pub fn save_dataset(data: &SyntheticData, dir: &Path) -> Result<()> {
    let series_dir = dir.join("series");
    std::fs::create_dir_all(&series_dir)
        .with_context(|| format!("failed to create dataset dir: {}", series_dir.display()))?;

    write(&dir.join("latents.csv"), &export_latents_csv(&data.latents)?)?;
    for (id, series) in &data.series {
        write(
            &series_dir.join(format!("{id}.csv")),
            &export_series_csv(series)?,
        )?;
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "close"])?;
    for (date, close) in &data.benchmark {
        wtr.write_record([date.to_string(), close.to_string()])?;
    }
    write(&dir.join("benchmark.csv"), &finish(wtr)?)?;

    log::info!(
        "wrote {} instruments to {}",
        data.series.len(),
        dir.display()
    );
    Ok(())
}
