//! End-to-end dataset pipeline
//!
//! Prices go through indicator, filter, sampler, renderer and dataset builder
//! once per class. The class datasets are then merged and optionally uploaded.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::data::{Column, Frame, Signal};
use crate::dataset::{build_dataset, merge_parquet};
use crate::error::Result;
use crate::imaging::{RenderReport, RenderPlan, WindowRenderer};
use crate::io::{ensure_dir, load_prices_csv, remove_file_if_exists};
use crate::sampling::{filter_groups, sample_groups};
use crate::storage::{FsObjectStore, ObjectStore, UploadReport, Uploader};

/// File name of the merged dataset inside the output directory
pub const MERGED_FILE: &str = "merged.parquet";

/// Result of one class pass
#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub signal: Signal,
    /// Firms with enough matching rows to be sampled
    pub firms_kept: usize,
    /// Rows flagged by the sampler
    pub sampled: usize,
    pub render: RenderReport,
    /// Dataset written for this class, if any image was rendered
    pub dataset: Option<PathBuf>,
    pub rows: usize,
}

/// Result of a full pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub indicator: String,
    pub input_rows: usize,
    pub classes: Vec<ClassReport>,
    pub merged: Option<PathBuf>,
    pub merged_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadReport>,
}

impl PipelineReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Pipeline driven by a validated [`PipelineConfig`]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read the configured price CSV
    pub fn load_input(&self) -> Result<Frame> {
        let data = &self.config.data;
        load_prices_csv(&data.input, &data.firm_column, &data.time_column)
    }

    /// Append indicator columns and the integer buy-signal column
    pub fn prepare(&self, mut frame: Frame) -> Result<Frame> {
        let data = &self.config.data;
        frame.validate_series(&data.firm_column, &data.time_column)?;

        let indicator = &self.config.indicator;
        indicator.append_to(&mut frame, &data.firm_column, &data.close_column)?;
        let signal = indicator.buy_signal(&frame, &data.firm_column, &data.close_column)?;
        let buys = signal.iter().filter(|&&s| s == 1).count();
        frame.set_column(&self.config.sampling.signal_column, Column::Int(signal))?;

        info!(rows = frame.height(), buys, indicator = indicator.name(), "indicators appended");
        Ok(frame)
    }

    fn class_image_dir(&self, signal: Signal) -> PathBuf {
        self.config.rendering.image_dir.join(signal.as_str())
    }

    fn class_dataset_path(&self, signal: Signal) -> PathBuf {
        self.config
            .dataset
            .output_dir
            .join(format!("{}.parquet", signal.as_str()))
    }

    /// Filter, sample, render and pack one class of a prepared frame
    pub fn run_class(&self, frame: &Frame, signal: Signal) -> Result<ClassReport> {
        let data = &self.config.data;
        let sampling = &self.config.sampling;
        let rendering = &self.config.rendering;
        let value = signal.target_value();

        let filtered = filter_groups(
            frame,
            &data.firm_column,
            &sampling.signal_column,
            &value,
            sampling.samples_per_group,
        )?;
        let firms_kept = if filtered.is_empty() {
            0
        } else {
            filtered.group_indices(&data.firm_column)?.len()
        };

        let mut report = ClassReport {
            signal,
            firms_kept,
            sampled: 0,
            render: RenderReport::default(),
            dataset: None,
            rows: 0,
        };
        if firms_kept == 0 {
            warn!(%signal, min_count = sampling.samples_per_group, "no firm has enough signal rows");
            return Ok(report);
        }

        let sampled = sample_groups(
            &filtered,
            &data.firm_column,
            &sampling.signal_column,
            &value,
            sampling.samples_per_group,
            &sampling.flag_column,
            sampling.strategy(),
        )?;
        report.sampled = sampled.bools(&sampling.flag_column)?.iter().filter(|&&f| f).count();

        let image_dir = self.class_image_dir(signal);
        let renderer = WindowRenderer::new(rendering.window_size, &image_dir)?
            .image_size(rendering.width, rendering.height)
            .columns(data.firm_column.as_str(), data.time_column.as_str());
        let plan = RenderPlan {
            indicator: self.config.indicator.name().to_string(),
            signal,
            plot_var: rendering.plot_var.clone(),
            kinds: rendering.kinds.clone(),
        };
        report.render = renderer.render_sampled(&sampled, &sampling.flag_column, &plan)?;

        if report.render.rendered.is_empty() {
            warn!(%signal, "no window rendered, dataset skipped");
            return Ok(report);
        }

        // only this pass's images; the directory may hold leftovers
        let rendered = &report.render.rendered;
        let names = rendered.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        let dataset = build_dataset(rendered, &vec![signal.label(); rendered.len()])?.with_names(names)?;

        let path = self.class_dataset_path(signal);
        ensure_dir(&self.config.dataset.output_dir)?;
        dataset.write_parquet(&path)?;
        info!(%signal, rows = dataset.len(), path = %path.display(), "class dataset written");

        if self.config.dataset.clear_images {
            let mut removed = 0;
            for image in rendered {
                removed += usize::from(remove_file_if_exists(image)?);
            }
            if removed != rendered.len() {
                warn!(removed, expected = rendered.len(), dir = %image_dir.display(), "images vanished before cleanup");
            }
        }

        report.rows = dataset.len();
        report.dataset = Some(path);
        Ok(report)
    }

    /// Run every class on `frame`, merge and upload
    pub fn run(&self, frame: Frame) -> Result<PipelineReport> {
        let input_rows = frame.height();
        let frame = self.prepare(frame)?;

        let classes = Signal::ALL
            .iter()
            .map(|&signal| self.run_class(&frame, signal))
            .collect::<Result<Vec<_>>>()?;

        let mut outputs: Vec<&Path> = classes.iter().filter_map(|c| c.dataset.as_deref()).collect();
        let (merged, merged_rows) = if outputs.is_empty() {
            warn!("no class produced a dataset, nothing to merge");
            (None, 0)
        } else {
            let path = self.config.dataset.output_dir.join(MERGED_FILE);
            let dataset = merge_parquet(&outputs, &path)?;
            (Some(path), dataset.len())
        };

        let upload = match (&self.config.storage, &merged) {
            (Some(storage), Some(merged_path)) => {
                outputs.push(merged_path.as_path());
                let uploader = Uploader::new(FsObjectStore::new(&storage.root), storage.policy())?;
                uploader.store().create_bucket(&storage.bucket)?;
                let report = if storage.delete_after_upload {
                    uploader.upload_then_delete(&storage.bucket, &outputs)?
                } else {
                    uploader.upload_all(&storage.bucket, &outputs)?
                };
                Some(report)
            }
            _ => None,
        };

        let report = PipelineReport {
            indicator: self.config.indicator.name().to_string(),
            input_rows,
            classes,
            merged,
            merged_rows,
            upload,
        };
        info!(
            merged_rows = report.merged_rows,
            classes = report.classes.len(),
            "pipeline finished"
        );
        Ok(report)
    }

    /// Load the configured input and run
    pub fn run_from_input(&self) -> Result<PipelineReport> {
        let frame = self.load_input()?;
        self.run(frame)
    }
}
