//! Error types for GeoTIFF reading.

use thiserror::Error;

/// Errors that can occur while decoding a raster.
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Failed to read raster file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF decode error: {0}")]
    Decode(String),

    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid raster dimensions: {width}x{height} with {samples} values")]
    InvalidDimensions {
        width: usize,
        height: usize,
        samples: usize,
    },
}

impl From<tiff::TiffError> for RasterError {
    fn from(err: tiff::TiffError) -> Self {
        RasterError::Decode(err.to_string())
    }
}

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
