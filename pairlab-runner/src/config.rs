//! Serializable pipeline configuration.
//!
//! Loaded once from TOML, validated, then passed by reference to every stage.
//! Every section and field has a default, so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use pairlab_core::engine::{CostModel, SimulationConfig, TradeFrequency};
use pairlab_core::policies::{FixedWeights, NeutralPolicy, SpreadReversion};
use pairlab_core::{KMeans, Policy};

/// Unique identifier for a pipeline run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub latent: LatentConfig,
    pub clustering: ClusteringConfig,
    pub pairs: PairsConfig,
    pub simulation: SimulationSection,
    pub policy: PolicyConfig,
    pub metrics: MetricsConfig,
    pub runtime: RuntimeConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LatentConfig {
    /// Expected latent vector length.
    pub dimension: usize,
    /// Trailing rows handed to the policy each day.
    pub window_length: usize,
}

impl Default for LatentConfig {
    fn default() -> Self {
        Self {
            dimension: 10,
            window_length: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusteringConfig {
    pub k: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub restarts: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k: 10,
            seed: 42,
            max_iterations: 300,
            tolerance: 1e-4,
            restarts: 10,
        }
    }
}

impl ClusteringConfig {
    pub fn kmeans(&self) -> KMeans {
        KMeans::new(self.k, self.seed)
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance)
            .with_restarts(self.restarts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PairsConfig {
    /// Pairs kept per cluster.
    pub top_n: usize,
}

impl Default for PairsConfig {
    fn default() -> Self {
        Self { top_n: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    pub initial_capital: f64,
    pub frequency: TradeFrequency,
    /// Commission in basis points of traded notional.
    pub cost_bps: f64,
    pub slippage_bps: f64,
    pub fractional_shares: bool,
    pub max_gross_exposure: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            initial_capital: 1000.0,
            frequency: TradeFrequency::Daily,
            cost_bps: 0.0,
            slippage_bps: 0.0,
            fractional_shares: false,
            max_gross_exposure: 1.0,
        }
    }
}

/// Which built-in policy drives the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Neutral,
    FixedWeights(FixedWeights),
    SpreadReversion(SpreadReversion),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::SpreadReversion(SpreadReversion::default())
    }
}

impl PolicyConfig {
    pub fn build(&self) -> Box<dyn Policy> {
        match self {
            PolicyConfig::Neutral => Box::new(NeutralPolicy),
            PolicyConfig::FixedWeights(p) => Box::new(*p),
            PolicyConfig::SpreadReversion(p) => Box::new(*p),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            PolicyConfig::Neutral => Ok(()),
            PolicyConfig::FixedWeights(p) => {
                if p.weight_a.is_finite() && p.weight_b.is_finite() {
                    Ok(())
                } else {
                    Err("policy weights must be finite".into())
                }
            }
            PolicyConfig::SpreadReversion(p) => {
                if !(p.exit_z >= 0.0 && p.entry_z > p.exit_z) {
                    return Err(format!(
                        "spread_reversion needs entry_z > exit_z >= 0, got {} / {}",
                        p.entry_z, p.exit_z
                    ));
                }
                if !(p.leg_weight.is_finite() && p.leg_weight > 0.0) {
                    return Err("spread_reversion leg_weight must be positive".into());
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Annual risk-free rate for Sharpe and Sortino.
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Simulation worker threads. Defaults to available parallelism - 1.
    pub workers: Option<usize>,
}

impl RuntimeConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub latents: Option<PathBuf>,
    pub series_dir: Option<PathBuf>,
    pub benchmark: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            latents: None,
            series_dir: None,
            benchmark: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.latent.dimension == 0 {
            return invalid("latent.dimension must be at least 1".into());
        }
        if self.clustering.k == 0 {
            return invalid("clustering.k must be at least 1".into());
        }
        if !(self.clustering.tolerance >= 0.0) {
            return invalid("clustering.tolerance must be non-negative".into());
        }
        if self.pairs.top_n == 0 {
            return invalid("pairs.top_n must be at least 1".into());
        }
        if self.simulation.cost_bps < 0.0 || self.simulation.slippage_bps < 0.0 {
            return invalid("simulation costs must be non-negative".into());
        }
        if self.runtime.workers == Some(0) {
            return invalid("runtime.workers must be at least 1".into());
        }
        self.simulation_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("simulation: {e}")))?;
        self.policy
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("policy: {e}")))?;
        Ok(())
    }

    /// Engine configuration derived from the `[simulation]` and `[latent]` sections.
    pub fn simulation_config(&self) -> SimulationConfig {
        let s = &self.simulation;
        SimulationConfig::new(s.initial_capital)
            .with_frequency(s.frequency)
            .with_cost_model(CostModel::new(s.slippage_bps, s.cost_bps))
            .with_fractional_shares(s.fractional_shares)
            .with_max_gross_exposure(s.max_gross_exposure)
            .with_window_length(self.latent.window_length)
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two runs with identical configs share a RunId and an output directory.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
