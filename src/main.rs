//! CLI for building chart-image datasets
//!
//! Runs the full pipeline or its individual dataset and upload steps.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use chartset::config::PipelineConfig;
use chartset::dataset::{build_from_dir, merge_parquet, LabelSource};
use chartset::logging::setup_logging;
use chartset::pipeline::Pipeline;
use chartset::storage::{FsObjectStore, Uploader};
use chartset::Signal;

#[derive(Parser)]
#[command(name = "chartset")]
#[command(about = "Chart-image datasets for buy/no-buy classification", long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LabelArg {
    Buy,
    Nobuy,
    /// Guess from the first file name
    Infer,
}

impl From<LabelArg> for LabelSource {
    fn from(arg: LabelArg) -> Self {
        match arg {
            LabelArg::Buy => LabelSource::Explicit(Signal::Buy),
            LabelArg::Nobuy => LabelSource::Explicit(Signal::NoBuy),
            LabelArg::Infer => LabelSource::FromFileName,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline from a TOML config
    Run {
        /// Pipeline configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Write the run report as JSON here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Build a dataset from a directory of images
    Build {
        /// Image directory
        #[arg(short, long)]
        dir: PathBuf,

        /// Output Parquet file
        #[arg(short, long)]
        out: PathBuf,

        /// Label for every image in the directory
        #[arg(short, long, value_enum, default_value = "buy")]
        label: LabelArg,

        /// Remove the images after the dataset is written
        #[arg(long)]
        clear: bool,
    },

    /// Concatenate dataset files
    Merge {
        /// Output Parquet file
        #[arg(short, long)]
        out: PathBuf,

        /// Input Parquet files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Send a directory of images and its dataset to the object store
    Upload {
        /// Pipeline configuration file with a [storage] section
        #[arg(short, long)]
        config: PathBuf,

        /// Image directory
        #[arg(short, long)]
        dir: PathBuf,

        /// Dataset file name created inside the directory
        #[arg(short, long, default_value = "df.parquet")]
        name: String,

        /// Label for every image in the directory
        #[arg(short, long, value_enum)]
        label: LabelArg,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run { config, report } => run(config, report)?,
        Commands::Build {
            dir,
            out,
            label,
            clear,
        } => {
            let dataset = build_from_dir(&dir, &out, label.into(), clear)
                .with_context(|| format!("building dataset from {}", dir.display()))?;
            println!(
                "Wrote {} rows x {} pixels to {}",
                dataset.len(),
                dataset.num_pixels(),
                out.display()
            );
        }
        Commands::Merge { out, inputs } => {
            let merged = merge_parquet(&inputs, &out)?;
            println!("Merged {} files into {} rows at {}", inputs.len(), merged.len(), out.display());
        }
        Commands::Upload {
            config,
            dir,
            name,
            label,
        } => upload(config, dir, &name, label.into())?,
    }

    Ok(())
}

fn run(config_path: PathBuf, report_path: Option<PathBuf>) -> Result<()> {
    let config = PipelineConfig::from_toml(&config_path)?;
    let pipeline = Pipeline::new(config)?;
    info!(config = %config_path.display(), "starting pipeline");

    let report = pipeline.run_from_input()?;
    let json = report.to_json()?;
    match report_path {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("writing report {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn upload(config_path: PathBuf, dir: PathBuf, name: &str, label: LabelSource) -> Result<()> {
    let config = PipelineConfig::from_toml(&config_path)?;
    config.validate()?;
    let storage = config
        .storage
        .context("config has no [storage] section")?;

    let uploader = Uploader::new(FsObjectStore::new(&storage.root), storage.policy())?;
    let report = uploader.send_dir(&storage.bucket, &dir, name, label)?;

    println!(
        "Uploaded {} objects to '{}' ({} failed)",
        report.uploaded.len(),
        storage.bucket,
        report.failed.len()
    );
    if !report.is_complete() {
        anyhow::bail!("{} uploads failed", report.failed.len());
    }
    Ok(())
}
