//! Pipeline orchestration: clustering, pair selection, parallel simulation,
//! metrics, results table.
//!
//! Clustering and selection run once, sequentially. Simulation fans out over
//! pairs on a private rayon pool; each task owns its ledger and computes its
//! metrics before returning. Results come back in pair order whatever the
//! scheduling. Per-pair failures become a row status, never a run failure.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use pairlab_core::domain::{LatentSet, Pair};
use pairlab_core::engine::PolicyError;
use pairlab_core::{
    select_pairs, simulate, ClusterError, Clustering, Ledger, Policy, SelectionError,
    SimulationConfig, SimulationError,
};

use crate::config::{ConfigError, PipelineConfig, PolicyConfig};
use crate::data_loader::{
    benchmark_returns, load_benchmark, load_latents, load_series_dir, LoadError, SeriesStore,
};
use crate::metrics::{compute_metrics, BenchmarkReturns};
use crate::result::{PairReport, PairStatus, ResultsTable};
use crate::synthetic::SyntheticData;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{0} is not configured in [data]")]
    MissingInput(&'static str),

    #[error("latent dimension {found} does not match configured {expected}")]
    Dimension { expected: usize, found: usize },

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Builds the policy for one pair.
///
/// Called from worker threads. A failure marks that pair `error` and leaves
/// the rest of the run alone.
pub trait PolicyFactory: Send + Sync {
    fn build(&self, pair: &Pair) -> Result<Box<dyn Policy>, PolicyError>;
}

impl PolicyFactory for PolicyConfig {
    fn build(&self, _pair: &Pair) -> Result<Box<dyn Policy>, PolicyError> {
        Ok(PolicyConfig::build(self))
    }
}

impl<F> PolicyFactory for F
where
    F: Fn(&Pair) -> Result<Box<dyn Policy>, PolicyError> + Send + Sync,
{
    fn build(&self, pair: &Pair) -> Result<Box<dyn Policy>, PolicyError> {
        self(pair)
    }
}

/// Everything the pipeline reads.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub latents: LatentSet,
    pub series: SeriesStore,
    pub benchmark: BenchmarkReturns,
}

impl PipelineInput {
    /// Load the files named in `[data]`. The benchmark is optional.
    pub fn load(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let data = &config.data;
        let latents_path = data
            .latents
            .as_deref()
            .ok_or(PipelineError::MissingInput("data.latents"))?;
        let series_dir = data
            .series_dir
            .as_deref()
            .ok_or(PipelineError::MissingInput("data.series_dir"))?;

        let latents = load_latents(latents_path, Some(config.latent.dimension))?;
        let series = load_series_dir(series_dir, latents.ids())?;
        let benchmark = match &data.benchmark {
            Some(path) => load_benchmark(path)?,
            None => BenchmarkReturns::new(),
        };
        Ok(Self {
            latents,
            series,
            benchmark,
        })
    }
}

impl From<SyntheticData> for PipelineInput {
    fn from(data: SyntheticData) -> Self {
        Self {
            latents: data.latents,
            series: data.series,
            benchmark: benchmark_returns(data.benchmark),
        }
    }
}

/// Result of one pair's task.
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub report: PairReport,
    /// Absent for `error` rows, alignment failures, and cancellations.
    pub ledger: Option<Ledger>,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub clustering: Clustering,
    pub pairs: Vec<Pair>,
    pub table: ResultsTable,
    /// Ledgers of simulated pairs, in pair order.
    pub ledgers: Vec<Ledger>,
}

/// Cluster the latent vectors with the configured k-means parameters.
pub fn run_clustering(
    config: &PipelineConfig,
    latents: &LatentSet,
) -> Result<Clustering, PipelineError> {
    if !latents.is_empty() && latents.dimension() != config.latent.dimension {
        return Err(PipelineError::Dimension {
            expected: config.latent.dimension,
            found: latents.dimension(),
        });
    }
    Ok(config.clustering.kmeans().fit(latents)?)
}

/// Cluster, then select the top pairs per cluster.
pub fn run_selection(
    config: &PipelineConfig,
    latents: &LatentSet,
) -> Result<(Clustering, Vec<Pair>), PipelineError> {
    let clustering = run_clustering(config, latents)?;
    let pairs = select_pairs(latents, &clustering.assignment, config.pairs.top_n)?;
    Ok((clustering, pairs))
}

/// Simulate every pair on a pool of `config.runtime.worker_count()` threads.
///
/// Setting `cancel` makes in-flight pairs stop at their next day and report
/// `incomplete`; pairs not yet started report `incomplete` without running.
pub fn simulate_pairs(
    config: &PipelineConfig,
    pairs: &[Pair],
    input: &PipelineInput,
    factory: &dyn PolicyFactory,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<PairOutcome>, PipelineError> {
    let sim_config = config.simulation_config();
    let workers = config.runtime.worker_count();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;
    log::info!("simulating {} pairs on {workers} workers", pairs.len());

    let task = PairTask {
        sim_config: &sim_config,
        input,
        factory,
        risk_free_rate: config.metrics.risk_free_rate,
        cancel,
    };
    let outcomes: Vec<PairOutcome> =
        pool.install(|| pairs.par_iter().map(|pair| task.run(pair)).collect());

    let (mut complete, mut incomplete, mut error) = (0usize, 0usize, 0usize);
    for o in &outcomes {
        match o.report.status {
            PairStatus::Complete => complete += 1,
            PairStatus::Incomplete => incomplete += 1,
            PairStatus::Error => error += 1,
        }
    }
    log::info!("simulation done: {complete} complete, {incomplete} incomplete, {error} error");
    Ok(outcomes)
}

/// Full run: cluster, select, simulate, score.
pub fn run_pipeline(
    config: &PipelineConfig,
    input: &PipelineInput,
    factory: &dyn PolicyFactory,
    cancel: Option<&AtomicBool>,
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    let run_id = config.run_id()?;
    log::info!("run {}", &run_id[..12.min(run_id.len())]);

    let (clustering, pairs) = run_selection(config, &input.latents)?;
    let outcomes = simulate_pairs(config, &pairs, input, factory, cancel)?;

    let mut rows = Vec::with_capacity(outcomes.len());
    let mut ledgers = Vec::new();
    for outcome in outcomes {
        rows.push(outcome.report);
        ledgers.extend(outcome.ledger);
    }
    Ok(PipelineOutput {
        clustering,
        pairs,
        table: ResultsTable::new(run_id, rows),
        ledgers,
    })
}

/// Shared, read-only context for one pair's simulation.
struct PairTask<'a> {
    sim_config: &'a SimulationConfig,
    input: &'a PipelineInput,
    factory: &'a dyn PolicyFactory,
    risk_free_rate: f64,
    cancel: Option<&'a AtomicBool>,
}

impl PairTask<'_> {
    fn run(&self, pair: &Pair) -> PairOutcome {
        let capital = self.sim_config.initial_capital;
        let failed = |status: PairStatus, message: String| {
            log::warn!("{pair}: {status}: {message}");
            PairOutcome {
                report: PairReport::failed(pair, status, message, capital),
                ledger: None,
            }
        };

        if self.cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return failed(PairStatus::Incomplete, "cancelled before start".into());
        }

        let series = &self.input.series;
        let (series_a, series_b) = match (
            series.get(&pair.instrument_a),
            series.get(&pair.instrument_b),
        ) {
            (Some(a), Some(b)) => (a, b),
            (a, _) => {
                let missing = if a.is_none() {
                    &pair.instrument_a
                } else {
                    &pair.instrument_b
                };
                return failed(PairStatus::Error, format!("no series for {missing}"));
            }
        };

        let policy = match self.factory.build(pair) {
            Ok(policy) => policy,
            Err(e) => return failed(PairStatus::Error, format!("policy construction: {e}")),
        };

        match simulate(
            pair,
            series_a,
            series_b,
            policy.as_ref(),
            self.sim_config,
            self.cancel,
        ) {
            Ok(ledger) => {
                let metrics = compute_metrics(&ledger, &self.input.benchmark, self.risk_free_rate);
                let report = PairReport::from_ledger(&ledger, metrics);
                if report.status == PairStatus::Complete {
                    log::debug!(
                        "{pair}: {} days, pnl {:.2}, sharpe {:.3}",
                        report.metrics.days,
                        report.metrics.total_pnl,
                        report.metrics.sharpe
                    );
                } else {
                    log::warn!("{pair}: {}", report.message);
                }
                PairOutcome {
                    report,
                    ledger: Some(ledger),
                }
            }
            Err(e @ (SimulationError::Alignment(_) | SimulationError::Cancelled { .. })) => {
                failed(PairStatus::Incomplete, e.to_string())
            }
            Err(e) => failed(PairStatus::Error, e.to_string()),
        }
    }
}
