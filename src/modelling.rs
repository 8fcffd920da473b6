//! AutoML hand-off
//!
//! Training itself is delegated to an [`AutoMlBackend`]. A [`Session`] owns the
//! backend for an explicit open/close lifetime and feeds it frames loaded from
//! dataset files.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{LabeledDataset, LABEL_COLUMN, NAME_COLUMN};
use crate::error::{Error, Result};
use crate::io::ensure_dir;

/// Search limits handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMlConfig {
    pub max_models: usize,
    pub max_runtime_minutes: u64,
}

impl Default for AutoMlConfig {
    fn default() -> Self {
        Self {
            max_models: 100,
            max_runtime_minutes: 5,
        }
    }
}

impl AutoMlConfig {
    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime_minutes * 60)
    }
}

/// Numeric training table with named columns
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingFrame {
    names: Vec<String>,
    values: Array2<f64>,
    factors: BTreeSet<String>,
}

impl TrainingFrame {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(Error::LengthMismatch {
                left: names.len(),
                right: values.ncols(),
            });
        }
        Ok(Self {
            names,
            values,
            factors: BTreeSet::new(),
        })
    }

    /// Label column followed by every pixel column
    pub fn from_dataset(dataset: &LabeledDataset) -> Self {
        let mut values = Array2::<f64>::zeros((dataset.len(), 1 + dataset.num_pixels()));
        for (i, &label) in dataset.labels().iter().enumerate() {
            values[[i, 0]] = label as f64;
        }
        values
            .slice_mut(ndarray::s![.., 1..])
            .assign(&dataset.pixels().mapv(f64::from));

        let mut names = dataset.column_names();
        names.retain(|n| n != NAME_COLUMN);
        Self {
            names,
            values,
            factors: BTreeSet::new(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::InvalidColumn(name.to_string()))?;
        Ok(self.values.index_axis(Axis(1), idx))
    }

    /// Treat `name` as categorical
    pub fn as_factor(&mut self, name: &str) -> Result<()> {
        self.column(name)?;
        self.factors.insert(name.to_string());
        Ok(())
    }

    pub fn is_factor(&self, name: &str) -> bool {
        self.factors.contains(name)
    }
}

/// Split a frame into its outcome and predictor names.
///
/// With `as_factor` the outcome becomes categorical. Every other column is a
/// predictor.
pub fn prepare_frame(frame: &mut TrainingFrame, outcome: &str, as_factor: bool) -> Result<(String, Vec<String>)> {
    frame.column(outcome)?;
    if as_factor {
        frame.as_factor(outcome)?;
    }
    let predictors = frame.names().iter().filter(|n| *n != outcome).cloned().collect();
    Ok((outcome.to_string(), predictors))
}

/// One trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub model_id: String,
    pub auc: f64,
    pub logloss: f64,
}

/// Models ranked best first by AUC
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new(mut entries: Vec<LeaderboardEntry>) -> Self {
        entries.sort_by(|a, b| b.auc.total_cmp(&a.auc).then(a.logloss.total_cmp(&b.logloss)));
        Self { entries }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn leader(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// AutoML engine
pub trait AutoMlBackend {
    /// Train candidate models and return them ranked
    fn train(
        &mut self,
        frame: &TrainingFrame,
        outcome: &str,
        predictors: &[String],
        config: &AutoMlConfig,
    ) -> Result<Leaderboard>;

    /// Persist the best model of the last training run into `dir`
    fn save_leader(&self, dir: &Path) -> Result<PathBuf>;
}

/// Open connection to an AutoML backend
pub struct Session<B> {
    backend: B,
    config: AutoMlConfig,
    open: bool,
}

impl<B: AutoMlBackend> Session<B> {
    pub fn open(backend: B, config: AutoMlConfig) -> Self {
        info!(
            max_models = config.max_models,
            max_runtime_minutes = config.max_runtime_minutes,
            "modelling session opened"
        );
        Self {
            backend,
            config,
            open: true,
        }
    }

    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            info!("modelling session closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn config(&self) -> &AutoMlConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::SessionClosed)
        }
    }

    /// Read and concatenate dataset files into one training frame
    pub fn load_parquet<P: AsRef<Path>>(&self, paths: &[P]) -> Result<TrainingFrame> {
        self.ensure_open()?;
        if paths.is_empty() {
            return Err(Error::InvalidParameter("no dataset files given".into()));
        }
        let parts = paths
            .iter()
            .map(LabeledDataset::read_parquet)
            .collect::<Result<Vec<_>>>()?;
        let dataset = LabeledDataset::concat(&parts)?;
        Ok(TrainingFrame::from_dataset(&dataset))
    }

    /// Train, save the leader under `save_dir` and return the leaderboard.
    ///
    /// The leaderboard is also written to `save_dir/leaderboard.json`.
    pub fn train_and_save<P: AsRef<Path>>(
        &mut self,
        frame: &TrainingFrame,
        outcome: &str,
        predictors: &[String],
        save_dir: P,
    ) -> Result<Leaderboard> {
        self.ensure_open()?;
        if predictors.is_empty() {
            return Err(Error::InvalidParameter("no predictors given".into()));
        }
        for name in std::iter::once(outcome).chain(predictors.iter().map(String::as_str)) {
            frame.column(name)?;
        }

        let save_dir = save_dir.as_ref();
        ensure_dir(save_dir)?;

        let leaderboard = self.backend.train(frame, outcome, predictors, &self.config)?;
        let model_path = self.backend.save_leader(save_dir)?;
        leaderboard.save_json(save_dir.join("leaderboard.json"))?;

        info!(
            models = leaderboard.len(),
            leader = leaderboard.leader().map(|e| e.model_id.as_str()).unwrap_or("-"),
            path = %model_path.display(),
            "leader saved"
        );
        Ok(leaderboard)
    }
}

/// Default outcome column for datasets built by this crate
pub const DEFAULT_OUTCOME: &str = LABEL_COLUMN;
