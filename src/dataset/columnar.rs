//! Parquet persistence for labeled datasets

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::{debug, info};

use crate::dataset::builder::{pixel_column, LabeledDataset, LABEL_COLUMN, NAME_COLUMN};
use crate::error::{Error, Result};
use crate::io::ensure_dir;

impl LabeledDataset {
    fn schema(&self) -> SchemaRef {
        let mut fields = Vec::with_capacity(self.width());
        fields.push(Field::new(LABEL_COLUMN, DataType::Int64, false));
        fields.extend((0..self.num_pixels()).map(|i| Field::new(pixel_column(i), DataType::UInt8, false)));
        if self.names().is_some() {
            fields.push(Field::new(NAME_COLUMN, DataType::Utf8, false));
        }
        Arc::new(Schema::new(fields))
    }

    /// Convert to a single Arrow record batch
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(self.width());
        columns.push(Arc::new(Int64Array::from(self.labels().to_vec())));
        for column in self.pixels().columns() {
            columns.push(Arc::new(UInt8Array::from(column.to_vec())));
        }
        if let Some(names) = self.names() {
            columns.push(Arc::new(StringArray::from(names.to_vec())));
        }

        Ok(RecordBatch::try_new(self.schema(), columns)?)
    }

    /// Write as ZSTD-compressed Parquet
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let batch = self.to_record_batch()?;
        let file = File::create(path.as_ref())?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(Default::default()))
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        debug!(rows = self.len(), path = %path.as_ref().display(), "parquet written");
        Ok(())
    }

    /// Read a dataset written by [`LabeledDataset::write_parquet`]
    pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;

        let mut parts = Vec::new();
        for batch in reader {
            parts.push(from_record_batch(&batch?)?);
        }

        if parts.is_empty() {
            let num_pixels = pixel_fields(&schema).len();
            return Ok(LabeledDataset::empty(num_pixels));
        }
        LabeledDataset::concat(&parts)
    }
}

/// Concatenate dataset files into `out`
pub fn merge_parquet<P: AsRef<Path>, Q: AsRef<Path>>(inputs: &[P], out: Q) -> Result<LabeledDataset> {
    if inputs.is_empty() {
        return Err(Error::InvalidParameter("nothing to merge".into()));
    }
    let parts = inputs
        .iter()
        .map(LabeledDataset::read_parquet)
        .collect::<Result<Vec<_>>>()?;
    let merged = LabeledDataset::concat(&parts)?;

    let out = out.as_ref();
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    merged.write_parquet(out)?;
    info!(files = inputs.len(), rows = merged.len(), path = %out.display(), "datasets merged");
    Ok(merged)
}

/// Names of the pixel columns in schema order
fn pixel_fields(schema: &Schema) -> Vec<String> {
    schema
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .filter(|name| name.starts_with("pixel_"))
        .collect()
}

fn typed<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::InvalidColumn(name.to_string()))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::InvalidColumn(format!("{} has an unexpected type", name)))
}

/// Rebuild a dataset from one record batch
pub fn from_record_batch(batch: &RecordBatch) -> Result<LabeledDataset> {
    let rows = batch.num_rows();
    let labels = typed::<Int64Array>(batch, LABEL_COLUMN)?;
    let labels: Vec<i64> = (0..rows).map(|i| labels.value(i)).collect();

    let pixel_names = pixel_fields(batch.schema().as_ref());
    let pixel_columns = pixel_names
        .iter()
        .map(|name| typed::<UInt8Array>(batch, name))
        .collect::<Result<Vec<_>>>()?;

    let mut pixels = Array2::<u8>::zeros((rows, pixel_columns.len()));
    for (j, column) in pixel_columns.iter().enumerate() {
        for i in 0..rows {
            pixels[[i, j]] = column.value(i);
        }
    }

    let names = match batch.column_by_name(NAME_COLUMN) {
        Some(_) => {
            let names = typed::<StringArray>(batch, NAME_COLUMN)?;
            Some((0..names.len()).map(|i| names.value(i).to_string()).collect())
        }
        None => None,
    };

    LabeledDataset::new(labels, pixels, names)
}
