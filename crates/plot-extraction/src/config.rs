//! Configuration for plot extraction.

use serde::{Deserialize, Serialize};

/// Tuning knobs for masking and alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Pixels trimmed from each side of the aligned crop box.
    pub crop_buffer: usize,

    /// Smallest plot contour area, in square pixels, accepted for alignment.
    pub min_contour_area: f64,

    /// Gaussian sigma used before re-thresholding the rotated mask; 0 skips
    /// the blur.
    pub blur_sigma: f32,

    /// File extensions treated as rasters (case-insensitive, no dot).
    pub raster_extensions: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            crop_buffer: 2,
            min_contour_area: 4.0,
            blur_sigma: 0.8,
            raster_extensions: vec!["tif".to_string()],
        }
    }
}

impl ExtractionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PLOT_CROP_BUFFER") {
            if let Ok(buffer) = val.parse() {
                config.crop_buffer = buffer;
            }
        }

        if let Ok(val) = std::env::var("PLOT_MIN_CONTOUR_AREA") {
            if let Ok(area) = val.parse() {
                config.min_contour_area = area;
            }
        }

        if let Ok(val) = std::env::var("PLOT_BLUR_SIGMA") {
            if let Ok(sigma) = val.parse() {
                config.blur_sigma = sigma;
            }
        }

        if let Ok(val) = std::env::var("PLOT_RASTER_EXTENSIONS") {
            let extensions: Vec<String> = val
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            if !extensions.is_empty() {
                config.raster_extensions = extensions;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.min_contour_area.is_finite() || self.min_contour_area < 0.0 {
            return Err("min_contour_area must be a non-negative number".to_string());
        }

        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err("blur_sigma must be >= 0".to_string());
        }

        if self.raster_extensions.is_empty() {
            return Err("raster_extensions must not be empty".to_string());
        }

        Ok(())
    }

    /// Whether a file extension names a raster.
    pub fn is_raster_extension(&self, extension: &str) -> bool {
        self.raster_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}
