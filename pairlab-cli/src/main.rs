//! PairLab CLI: clustering, pair selection, and pair simulation runs.
//!
//! Commands:
//! - `cluster`: cluster latent vectors and print the assignment
//! - `pairs`: cluster, then print the selected pairs
//! - `run`: full pipeline: cluster, select, simulate, score, export
//! - `synth`: write a deterministic synthetic dataset plus a config for it
//!
//! Logging goes to stderr; set `RUST_LOG` to change the level (default `info`).

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::path::{Path, PathBuf};

use pairlab_core::domain::{LatentSet, Pair};
use pairlab_core::Clustering;
use pairlab_runner::export::{export_clusters_csv, export_pairs_csv, save_dataset, save_run};
use pairlab_runner::{
    generate_synthetic, load_latents, run_clustering, run_pipeline, run_selection, PairStatus,
    PipelineConfig, PipelineInput, PipelineOutput, SyntheticSpec,
};

#[derive(Parser)]
#[command(
    name = "pairlab",
    about = "PairLab CLI: latent-space pair selection and pair trading simulation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster latent vectors and print the instrument to cluster assignment.
    Cluster {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Latents CSV, overriding `data.latents`.
        #[arg(long)]
        latents: Option<PathBuf>,

        /// Write the assignment as CSV instead of printing it.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Cluster, then select the closest pairs per cluster.
    Pairs {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Latents CSV, overriding `data.latents`.
        #[arg(long)]
        latents: Option<PathBuf>,

        /// Write the pairs as CSV instead of printing them.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the full pipeline and export results.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Worker threads, overriding `runtime.workers`.
        #[arg(long)]
        workers: Option<usize>,

        /// Output directory, overriding `data.output_dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Generate a deterministic synthetic dataset and a config pointing at it.
    Synth {
        /// Directory to write latents.csv, series/, benchmark.csv, pairlab.toml.
        #[arg(long, default_value = "data/synthetic")]
        output_dir: PathBuf,

        #[arg(long, default_value_t = 24)]
        instruments: usize,

        /// Number of latent groups; each group becomes a natural cluster.
        #[arg(long, default_value_t = 4)]
        groups: usize,

        #[arg(long, default_value_t = 10)]
        dimension: usize,

        /// Business days per series.
        #[arg(long, default_value_t = 500)]
        days: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Cluster {
            config,
            latents,
            output,
        } => run_cluster_cmd(config.as_deref(), latents, output.as_deref()),
        Commands::Pairs {
            config,
            latents,
            output,
        } => run_pairs_cmd(config.as_deref(), latents, output.as_deref()),
        Commands::Run {
            config,
            workers,
            output_dir,
        } => run_pipeline_cmd(&config, workers, output_dir),
        Commands::Synth {
            output_dir,
            instruments,
            groups,
            dimension,
            days,
            seed,
        } => run_synth_cmd(
            &output_dir,
            SyntheticSpec {
                instruments,
                groups,
                dimension,
                days,
                seed,
                ..SyntheticSpec::default()
            },
        ),
    }
}

fn init_logging() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_cli_latents(
    config_path: Option<&Path>,
    latents: Option<PathBuf>,
) -> Result<(PipelineConfig, LatentSet)> {
    let mut config = load_config(config_path)?;
    if latents.is_some() {
        config.data.latents = latents;
    }
    let path = config
        .data
        .latents
        .clone()
        .context("no latents file: pass --latents or set data.latents")?;
    let set = load_latents(&path, Some(config.latent.dimension))?;
    Ok((config, set))
}

fn run_cluster_cmd(
    config_path: Option<&Path>,
    latents: Option<PathBuf>,
    output: Option<&Path>,
) -> Result<()> {
    let (config, set) = load_cli_latents(config_path, latents)?;
    let clustering = run_clustering(&config, &set)?;

    if let Some(path) = output {
        std::fs::write(path, export_clusters_csv(&clustering)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Assignment written to: {}", path.display());
        return Ok(());
    }
    print_clusters(&clustering);
    Ok(())
}

fn run_pairs_cmd(
    config_path: Option<&Path>,
    latents: Option<PathBuf>,
    output: Option<&Path>,
) -> Result<()> {
    let (config, set) = load_cli_latents(config_path, latents)?;
    let (_, pairs) = run_selection(&config, &set)?;

    if let Some(path) = output {
        std::fs::write(path, export_pairs_csv(&pairs)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{} pairs written to: {}", pairs.len(), path.display());
        return Ok(());
    }
    print_pairs(&pairs);
    Ok(())
}

fn run_pipeline_cmd(
    config_path: &Path,
    workers: Option<usize>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(Some(config_path))?;
    if workers.is_some() {
        config.runtime.workers = workers;
    }
    if let Some(dir) = output_dir {
        config.data.output_dir = dir;
    }
    config.validate()?;

    let input = PipelineInput::load(&config).context("failed to load input data")?;
    let output = run_pipeline(&config, &input, &config.policy, None)?;
    print_summary(&output);

    let run_dir = save_run(&output, &config, &config.data.output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_synth_cmd(output_dir: &Path, spec: SyntheticSpec) -> Result<()> {
    let data = generate_synthetic(&spec)?;
    save_dataset(&data, output_dir)?;

    let mut config = PipelineConfig::default();
    config.latent.dimension = spec.dimension;
    config.clustering.k = spec.groups;
    config.data.latents = Some(output_dir.join("latents.csv"));
    config.data.series_dir = Some(output_dir.join("series"));
    config.data.benchmark = Some(output_dir.join("benchmark.csv"));
    config.data.output_dir = output_dir.join("output");
    let config_path = output_dir.join("pairlab.toml");
    std::fs::write(&config_path, config.to_toml_string()?)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    println!(
        "Synthetic dataset ({} instruments, {} days) written to: {}",
        spec.instruments,
        spec.days,
        output_dir.display()
    );
    println!("Run it with: pairlab run --config {}", config_path.display());
    println!("WARNING: synthetic data, for development only");
    Ok(())
}

fn print_clusters(clustering: &Clustering) {
    println!();
    println!("=== Clusters (k = {}) ===", clustering.k);
    println!("Inertia:        {:.4}", clustering.inertia);
    println!("Iterations:     {}", clustering.iterations);
    println!();
    for cluster in &clustering.clusters {
        let members: Vec<&str> = cluster.members.iter().map(|m| m.as_str()).collect();
        println!("{:>4}  {}", cluster.id.to_string(), members.join(" "));
    }
    println!();
}

fn print_pairs(pairs: &[Pair]) {
    println!();
    println!("{:<8} {:<12} {:<12} {:>10}", "Cluster", "A", "B", "Distance");
    println!("{}", "-".repeat(45));
    for p in pairs {
        println!(
            "{:<8} {:<12} {:<12} {:>10.4}",
            p.cluster_id.to_string(),
            p.instrument_a.as_str(),
            p.instrument_b.as_str(),
            p.distance
        );
    }
    println!();
}

fn print_summary(output: &PipelineOutput) {
    let counts = output.table.counts();
    println!();
    println!("=== Pipeline Result ===");
    println!("Clusters:       {}", output.clustering.clusters.len());
    println!("Pairs:          {}", output.pairs.len());
    println!(
        "Status:         {} complete, {} incomplete, {} error",
        counts.complete, counts.incomplete, counts.error
    );
    println!();
    println!(
        "{:<24} {:>12} {:>8} {:>8} {:>9} {:>7}",
        "Pair", "PnL", "Sharpe", "Sortino", "Max DD", "Trades"
    );
    println!("{}", "-".repeat(73));
    for row in &output.table.rows {
        let m = &row.metrics;
        if row.status == PairStatus::Complete {
            println!(
                "{:<24} {:>12.2} {:>8.3} {:>8.3} {:>8.2}% {:>7}",
                row.label(),
                m.total_pnl,
                m.sharpe,
                m.sortino,
                m.max_drawdown * 100.0,
                m.trade_count
            );
        } else {
            println!("{:<24} {:>12} {}", row.label(), row.status, row.message);
        }
    }
    println!();
}
