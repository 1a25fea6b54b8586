//! PairLab Runner: pipeline orchestration, configuration, data, metrics.
//!
//! This crate builds on `pairlab-core` to provide:
//! - TOML pipeline configuration with a content-addressed run id
//! - CSV loading for latent vectors, instrument series, and the benchmark
//! - Deterministic synthetic datasets
//! - The parallel pipeline: cluster, select, simulate, score
//! - Performance metrics and the results table
//! - CSV / JSON / Markdown export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod pipeline;
pub mod result;
pub mod synthetic;

pub use config::{ConfigError, PipelineConfig, PolicyConfig, RunId};
pub use data_loader::{load_benchmark, load_latents, load_series, load_series_dir, LoadError, SeriesStore};
pub use metrics::{compute_metrics, BenchmarkReturns, MetricsReport};
pub use pipeline::{
    run_clustering, run_pipeline, run_selection, simulate_pairs, PairOutcome, PipelineError,
    PipelineInput, PipelineOutput, PolicyFactory,
};
pub use result::{PairReport, PairStatus, ResultsTable, StatusCounts};
pub use synthetic::{generate as generate_synthetic, SyntheticData, SyntheticError, SyntheticSpec};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn results_are_send_sync() {
        assert_send::<PairReport>();
        assert_sync::<PairReport>();
        assert_send::<ResultsTable>();
        assert_sync::<ResultsTable>();
        assert_send::<MetricsReport>();
    }

    #[test]
    fn inputs_are_shareable_across_workers() {
        assert_sync::<PipelineInput>();
        assert_sync::<PipelineConfig>();
        assert_sync::<PolicyConfig>();
    }
}
