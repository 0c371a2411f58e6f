//! GeoTIFF orthomosaic reader.
//!
//! Decodes chunky (interleaved) multi-band TIFFs with the `tiff` crate and
//! returns one `f32` array per band together with the affine georeferencing
//! and, when declared, the alpha band position.
//!
//! Only what plot extraction needs is interpreted: ModelPixelScale and
//! ModelTiepoint for the transform, the GeoKeyDirectory EPSG keys for the
//! CRS, and ExtraSamples for alpha.

pub mod error;
pub mod geokeys;
pub mod geotransform;
mod decode;
mod raster;

pub use decode::{read_raster, read_raster_from_buffer};
pub use error::{RasterError, Result};
pub use geotransform::GeoTransform;
pub use raster::Raster;
