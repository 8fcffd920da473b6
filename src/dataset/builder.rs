//! Labeled pixel datasets built from rendered images

use std::path::{Path, PathBuf};

use ndarray::{concatenate, Array2, ArrayView1, Axis};
use tracing::{info, warn};

use crate::data::Signal;
use crate::dataset::flatten::flatten_image;
use crate::error::{Error, Result};
use crate::io::{clear_files, ensure_dir, list_files};

/// Name of the label column
pub const LABEL_COLUMN: &str = "label";
/// Name of the optional source-file column
pub const NAME_COLUMN: &str = "name";

/// Pixel column name for index `i`
pub fn pixel_column(i: usize) -> String {
    format!("pixel_{}", i)
}

/// One row per image: an integer label followed by its flattened pixels
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    labels: Vec<i64>,
    pixels: Array2<u8>,
    names: Option<Vec<String>>,
}

impl LabeledDataset {
    /// Assemble a dataset; `labels` and `names` must match the pixel rows
    pub fn new(labels: Vec<i64>, pixels: Array2<u8>, names: Option<Vec<String>>) -> Result<Self> {
        if labels.len() != pixels.nrows() {
            return Err(Error::LengthMismatch {
                left: pixels.nrows(),
                right: labels.len(),
            });
        }
        if let Some(names) = &names {
            if names.len() != labels.len() {
                return Err(Error::LengthMismatch {
                    left: names.len(),
                    right: labels.len(),
                });
            }
        }
        Ok(Self {
            labels,
            pixels,
            names,
        })
    }

    /// Dataset with no rows and `num_pixels` pixel columns
    pub fn empty(num_pixels: usize) -> Self {
        Self {
            labels: Vec::new(),
            pixels: Array2::zeros((0, num_pixels)),
            names: None,
        }
    }

    /// Attach source names (one per row)
    pub fn with_names(self, names: Vec<String>) -> Result<Self> {
        Self::new(self.labels, self.pixels, Some(names))
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Pixels per row
    pub fn num_pixels(&self) -> usize {
        self.pixels.ncols()
    }

    /// Number of columns including label and name
    pub fn width(&self) -> usize {
        1 + self.num_pixels() + usize::from(self.names.is_some())
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    pub fn pixels(&self) -> &Array2<u8> {
        &self.pixels
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    /// Pixels of row `i`
    pub fn row(&self, i: usize) -> ArrayView1<'_, u8> {
        self.pixels.row(i)
    }

    /// `label, pixel_0 … pixel_{k-1}` and then `name` if present
    pub fn column_names(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.width());
        columns.push(LABEL_COLUMN.to_string());
        columns.extend((0..self.num_pixels()).map(pixel_column));
        if self.names.is_some() {
            columns.push(NAME_COLUMN.to_string());
        }
        columns
    }

    /// Rows of all parts in order; names survive only if every part has them
    pub fn concat(parts: &[LabeledDataset]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Ok(Self::empty(0));
        };

        let expected = first.num_pixels();
        if let Some(odd) = parts.iter().find(|p| p.num_pixels() != expected) {
            return Err(Error::DimensionMismatch {
                expected,
                actual: odd.num_pixels(),
                path: PathBuf::new(),
            });
        }

        let views: Vec<_> = parts.iter().map(|p| p.pixels.view()).collect();
        let pixels = concatenate(Axis(0), &views)
            .map_err(|e| Error::InvalidParameter(format!("cannot stack pixel rows: {}", e)))?;
        let labels = parts.iter().flat_map(|p| p.labels.iter().copied()).collect();
        let names = parts
            .iter()
            .map(|p| p.names.clone())
            .collect::<Option<Vec<Vec<String>>>>()
            .map(|n| n.concat());

        Self::new(labels, pixels, names)
    }
}

/// Flatten `file_paths` in order and pair each with its label.
///
/// Fails with `LengthMismatch` before reading anything when the inputs differ
/// in length, and with `DimensionMismatch` when images differ in pixel count.
pub fn build_dataset<P: AsRef<Path>>(file_paths: &[P], labels: &[i64]) -> Result<LabeledDataset> {
    if file_paths.len() != labels.len() {
        return Err(Error::LengthMismatch {
            left: file_paths.len(),
            right: labels.len(),
        });
    }

    let mut expected: Option<usize> = None;
    let mut data = Vec::new();
    for path in file_paths {
        let flat = flatten_image(path)?;
        match expected {
            None => expected = Some(flat.len()),
            Some(n) if n != flat.len() => {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    actual: flat.len(),
                    path: path.as_ref().to_path_buf(),
                })
            }
            Some(_) => {}
        }
        data.extend(flat.into_pixels());
    }

    let pixels = Array2::from_shape_vec((file_paths.len(), expected.unwrap_or(0)), data)
        .map_err(|e| Error::InvalidParameter(format!("cannot shape pixel rows: {}", e)))?;
    LabeledDataset::new(labels.to_vec(), pixels, None)
}

/// Where the label for a directory of images comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    /// Label given by the caller
    Explicit(Signal),
    /// Compatibility shim: label 0 if the first file name contains `nobuy`,
    /// else 1. Applied to every file in the directory.
    FromFileName,
}

impl LabelSource {
    fn resolve(&self, files: &[PathBuf]) -> i64 {
        match self {
            LabelSource::Explicit(signal) => signal.label(),
            LabelSource::FromFileName => {
                let first = files
                    .first()
                    .and_then(|f| f.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if first.contains(Signal::NoBuy.as_str()) {
                    Signal::NoBuy.label()
                } else {
                    Signal::Buy.label()
                }
            }
        }
    }
}

/// Build a dataset from `files`, sharing one label, and write it to
/// `save_path` as Parquet. File paths are kept in the `name` column.
pub fn build_from_files<Q: AsRef<Path>>(
    files: &[PathBuf],
    save_path: Q,
    label: LabelSource,
) -> Result<LabeledDataset> {
    let save_path = save_path.as_ref();
    if files.is_empty() {
        return Err(Error::InvalidParameter(format!(
            "no image files for {}",
            save_path.display()
        )));
    }

    let label = label.resolve(files);
    let names = files.iter().map(|f| f.to_string_lossy().into_owned()).collect();
    let dataset = build_dataset(files, &vec![label; files.len()])?.with_names(names)?;

    if let Some(parent) = save_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    dataset.write_parquet(save_path)?;
    info!(
        rows = dataset.len(),
        pixels = dataset.num_pixels(),
        label,
        path = %save_path.display(),
        "dataset written"
    );
    Ok(dataset)
}

/// Build a dataset from every non-hidden file in `dir`, write it to
/// `save_path` as Parquet and optionally remove the source files.
///
/// All files share one label; see [`LabelSource`].
pub fn build_from_dir<P: AsRef<Path>, Q: AsRef<Path>>(
    dir: P,
    save_path: Q,
    label: LabelSource,
    clear_dir: bool,
) -> Result<LabeledDataset> {
    let dir = dir.as_ref();
    let files = list_files(dir)?;
    if files.is_empty() {
        return Err(Error::InvalidParameter(format!(
            "no image files in {}",
            dir.display()
        )));
    }

    let dataset = build_from_files(&files, save_path, label)?;

    if clear_dir {
        let removed = clear_files(dir)?;
        if removed != files.len() {
            warn!(removed, expected = files.len(), "directory changed while building");
        }
    }

    Ok(dataset)
}
