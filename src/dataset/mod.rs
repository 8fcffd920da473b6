//! Image-to-table conversion
//!
//! Flattens rendered charts to grayscale pixel vectors and packs them with
//! integer labels into a [`LabeledDataset`], persisted as Parquet.

mod builder;
mod columnar;
mod flatten;

pub use builder::{
    build_dataset, build_from_dir, build_from_files, pixel_column, LabelSource, LabeledDataset, LABEL_COLUMN,
    NAME_COLUMN,
};
pub use columnar::{from_record_batch, merge_parquet};
pub use flatten::{flatten_image, FlatImage};
