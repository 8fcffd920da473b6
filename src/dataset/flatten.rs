//! Grayscale flattening of saved images

use std::io::ErrorKind;
use std::path::Path;

use image::ImageError;

use crate::error::{Error, Result};

/// Row-major single-channel pixels of one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FlatImage {
    /// Number of pixels (`width * height`)
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// Load `path`, convert to 8-bit grayscale and flatten row by row
pub fn flatten_image<P: AsRef<Path>>(path: P) -> Result<FlatImage> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let img = image::open(path).map_err(|err| match err {
        ImageError::IoError(io) if io.kind() == ErrorKind::NotFound => {
            Error::FileNotFound(path.to_path_buf())
        }
        ImageError::IoError(io)
            if !matches!(io.kind(), ErrorKind::InvalidData | ErrorKind::UnexpectedEof) =>
        {
            Error::Io(io)
        }
        other => Error::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })?;

    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();
    Ok(FlatImage {
        width,
        height,
        pixels: gray.into_raw(),
    })
}
