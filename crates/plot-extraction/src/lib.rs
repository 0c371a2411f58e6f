//! Plot extraction pipeline.
//!
//! Turns a folder of dated orthomosaics and a polygon grid into per-plot,
//! per-band arrays plus a summary table of band means:
//!
//! 1. [`grid::read_grid`] parses the plot polygons
//! 2. [`mask::mask_plot`] clips a raster to one polygon
//! 3. [`align::auto_fit`] derives the de-rotation angle and crop box
//! 4. [`extractor::extract_raster`] runs 2-3 for every plot of one raster
//! 5. [`batch::process_folder`] does the same for every raster in a folder

pub mod align;
pub mod batch;
pub mod config;
pub mod extractor;
pub mod grid;
pub mod mask;
pub mod rotate;

pub use align::{auto_fit, Alignment, AlignmentFailure, CropBox};
pub use batch::{list_rasters, process_folder, BatchOutput};
pub use config::ExtractionConfig;
pub use extractor::{
    default_band_names, extract_raster, validate_band_names, ExtractionFailure, PlotSummary,
    RasterExtraction,
};
pub use grid::{read_grid, PlotGrid, PlotPolygon};
pub use mask::{mask_plot, MaskedPlot, PixelWindow};
