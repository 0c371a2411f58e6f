//! Decoded raster with per-band arrays.

use ndarray::Array2;
use plot_common::BoundingBox;

use crate::geotransform::GeoTransform;

/// A fully decoded multi-band raster held in memory.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    /// One array per sample, in file order, shaped [height, width].
    pub bands: Vec<Array2<f32>>,
    /// Index into `bands` of the declared alpha channel.
    pub alpha: Option<usize>,
    pub transform: GeoTransform,
    /// `EPSG:<code>` from the GeoKeyDirectory, when declared.
    pub crs: Option<String>,
}

impl Raster {
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Map extent of the raster.
    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }

    /// Bands holding spectral data: every band except a declared alpha.
    pub fn true_band_indices(&self) -> Vec<usize> {
        (0..self.bands.len())
            .filter(|i| Some(*i) != self.alpha)
            .collect()
    }

    /// Band used to derive plot footprints.
    ///
    /// The declared alpha channel when there is one, otherwise the last band
    /// stands in as the mask.
    pub fn mask_band_index(&self) -> Option<usize> {
        self.alpha.or_else(|| self.bands.len().checked_sub(1))
    }
}
