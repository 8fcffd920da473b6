//! # chartset
//!
//! Turns OHLC price series into labeled chart-image datasets for buy/no-buy
//! classification.
//!
//! ## Features
//!
//! - **Indicators**: MACD, RSI and Bollinger Bands buy signals per firm
//! - **Sampling**: Group filtering and seeded per-firm sampling of signal rows
//! - **Imaging**: Line and candlestick charts for each sampled window
//! - **Datasets**: Grayscale pixel tables persisted as Parquet
//! - **Storage / AutoML**: Upload and training hand-off behind traits
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartset::{config::PipelineConfig, pipeline::Pipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_toml("pipeline.toml")?;
//!     let report = Pipeline::new(config)?.run_from_input()?;
//!     println!("{}", report.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod imaging;
pub mod indicators;
pub mod io;
pub mod logging;
pub mod modelling;
pub mod pipeline;
pub mod sampling;
pub mod storage;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use data::{Candle, Column, Frame, Signal, Value};
pub use dataset::{build_dataset, build_from_dir, flatten_image, LabelSource, LabeledDataset};
pub use error::{Error, Result};
pub use imaging::{CandlestickRenderer, LineRenderer, PlotKind, WindowRenderer};
pub use indicators::Indicator;
pub use pipeline::{Pipeline, PipelineReport};
pub use sampling::{filter_groups, sample_groups, sample_signals, SeedStrategy};
pub use storage::{FsObjectStore, ObjectStore, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
