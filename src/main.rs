//! vader-hpopt CLI: hyperparameter sweeps and single fits of the reference
//! mixture model on a flat CSV data set.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vader_hpopt::fit::fit_full;
use vader_hpopt::job::JobSettings;
use vader_hpopt::model::{EarlyStopping, MixtureModelFactory};
use vader_hpopt::sweep::{BayesianOptimizer, OptimizerConfig, SamplerKind};
use vader_hpopt::{Dataset, HyperParams};

#[derive(Parser)]
#[command(name = "vader-hpopt")]
#[command(about = "Cross-validated Bayesian hyperparameter search for clustering models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the data comes from.
#[derive(Args)]
struct Input {
    /// CSV file, one row per sample, time-major values; empty/NA/nan is missing
    #[arg(long)]
    input_data_file: PathBuf,

    /// Number of time points per sample
    #[arg(long)]
    n_time_points: usize,

    /// The first CSV row is a header
    #[arg(long)]
    header: bool,
}

impl Input {
    fn load(&self) -> Result<Dataset> {
        if !self.input_data_file.exists() {
            bail!("input data file {} does not exist", self.input_data_file.display());
        }
        Dataset::read_flat_csv(&self.input_data_file, self.n_time_points, self.header)
            .with_context(|| format!("cannot load {}", self.input_data_file.display()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search hyperparameters for every candidate cluster count
    Optimize {
        #[command(flatten)]
        input: Input,

        /// JSON config file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Jobs per trial
        #[arg(long)]
        n_repeats: Option<usize>,

        /// Concurrency ceiling
        #[arg(long)]
        n_proc: Option<usize>,

        /// Trials per candidate K
        #[arg(long)]
        n_trials: Option<usize>,

        /// Consensus repeats per fold
        #[arg(long)]
        n_consensus: Option<usize>,

        /// Training epochs
        #[arg(long)]
        n_epoch: Option<usize>,

        /// Cross-validation folds
        #[arg(long)]
        n_splits: Option<usize>,

        /// Permutations for the null baseline
        #[arg(long)]
        n_perm: Option<usize>,

        /// Base seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output folder
        #[arg(long)]
        output_folder: Option<PathBuf>,

        /// Candidate cluster counts
        #[arg(long, num_args = 1..)]
        k_list: Option<Vec<usize>>,

        /// Per-K timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Continue journaled studies of an earlier run
        #[arg(long)]
        resume: bool,

        /// Suggester: tpe or random
        #[arg(long)]
        sampler: Option<String>,
    },

    /// Fit one configuration on the full data and write a clustering report
    Fit {
        #[command(flatten)]
        input: Input,

        /// Number of clusters
        #[arg(long)]
        k: usize,

        /// Hidden layer widths
        #[arg(long, num_args = 1.., required = true)]
        n_hidden: Vec<usize>,

        /// Learning rate
        #[arg(long)]
        learning_rate: f64,

        /// Batch size
        #[arg(long)]
        batch_size: usize,

        /// Latent loss weight
        #[arg(long, default_value = "1.0")]
        alpha: f64,

        /// Training epochs
        #[arg(long, default_value = "20")]
        n_epoch: usize,

        /// Repeats fused by consensus clustering
        #[arg(long, default_value = "1")]
        n_consensus: usize,

        /// Early stopping ratio
        #[arg(long)]
        early_stopping_ratio: Option<f64>,

        /// Early stopping window in epochs
        #[arg(long, default_value = "5")]
        early_stopping_batch_size: usize,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Report directory
        #[arg(long)]
        output_path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Optimize {
            input,
            config,
            n_repeats,
            n_proc,
            n_trials,
            n_consensus,
            n_epoch,
            n_splits,
            n_perm,
            seed,
            output_folder,
            k_list,
            timeout_secs,
            resume,
            sampler,
        } => {
            let mut cfg = match config {
                Some(path) => OptimizerConfig::from_json_file(&path)
                    .with_context(|| format!("cannot load config {}", path.display()))?,
                None => OptimizerConfig::default(),
            };
            apply(&mut cfg.n_repeats, n_repeats);
            apply(&mut cfg.n_proc, n_proc);
            apply(&mut cfg.n_trials, n_trials);
            apply(&mut cfg.n_consensus, n_consensus);
            apply(&mut cfg.n_epoch, n_epoch);
            apply(&mut cfg.n_splits, n_splits);
            apply(&mut cfg.n_perm, n_perm);
            apply(&mut cfg.output_folder, output_folder);
            apply(&mut cfg.k_list, k_list);
            apply(&mut cfg.timeout_secs, timeout_secs);
            if seed.is_some() {
                cfg.seed = seed;
            }
            cfg.resume |= resume;
            if let Some(name) = sampler {
                cfg.sampler = parse_sampler(&name)?;
            }
            cmd_optimize(&input, cfg)
        }
        Commands::Fit {
            input,
            k,
            n_hidden,
            learning_rate,
            batch_size,
            alpha,
            n_epoch,
            n_consensus,
            early_stopping_ratio,
            early_stopping_batch_size,
            seed,
            output_path,
        } => {
            let params = HyperParams::new(k, n_hidden, learning_rate, batch_size, alpha);
            let settings = JobSettings::default()
                .with_n_epoch(n_epoch)
                .with_n_consensus(n_consensus)
                .with_early_stopping(early_stopping_ratio.map(|ratio| EarlyStopping {
                    ratio,
                    batch_size: early_stopping_batch_size,
                }));
            cmd_fit(&input, &params, &settings, seed, &output_path)
        }
    }
}

fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn parse_sampler(name: &str) -> Result<SamplerKind> {
    match name.to_ascii_lowercase().as_str() {
        "tpe" => Ok(SamplerKind::Tpe),
        "random" => Ok(SamplerKind::Random),
        other => bail!("unknown sampler '{other}', expected tpe or random"),
    }
}

fn cmd_optimize(input: &Input, config: OptimizerConfig) -> Result<()> {
    let data = input.load()?;
    let optimizer = BayesianOptimizer::new(config, MixtureModelFactory)?;
    let summary = optimizer.run_blocking(data)?;

    println!("Best scores: {}", summary.best_scores_path.display());
    for k in &summary.per_k {
        match k.best_value() {
            Some(value) => println!("  k={}: best prediction strength diff {value:.4}", k.k),
            None => println!("  k={}: no defined score", k.k),
        }
    }
    if summary.n_failed_jobs > 0 {
        println!(
            "{} failed jobs, see {}",
            summary.n_failed_jobs,
            optimizer.config().failed_jobs_dir().display()
        );
    }
    Ok(())
}

fn cmd_fit(
    input: &Input,
    params: &HyperParams,
    settings: &JobSettings,
    seed: Option<u64>,
    output_path: &Path,
) -> Result<()> {
    let data = input.load()?;
    let report = fit_full(&MixtureModelFactory, &data, params, settings, seed)?;
    let path = report.append_to_dir(output_path, settings)?;
    print!("{report}");
    println!("Report: {}", path.display());
    Ok(())
}
