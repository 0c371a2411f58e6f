//! Project-level API over extracted plot data.
//!
//! A [`Project`] owns the date → plot → band arrays of every plot and the
//! summary table (`ldata`, one row per plot and date). It can be:
//!
//! - extracted from a folder of dated orthomosaics and a plot grid
//! - saved to and loaded from a Zarr archive
//! - enriched with per-plot features computed from the band arrays
//! - summarized into threshold-crossing days per plot

pub mod crossing;
pub mod feature;
pub mod project;

pub use crossing::{estimate_crossing, CrossingEstimate, CrossingRange};
pub use feature::PlotBands;
pub use project::{Extraction, Project, ProjectField, CROSSING_DAY_COLUMN, CROSSING_RANGE_COLUMN};

pub use plot_common::{PlotError, PlotResult, PlotTable};
pub use plot_extraction::ExtractionConfig;
pub use plot_store::StoreConfig;
