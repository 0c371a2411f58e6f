//! Common types shared by every crate of the plot-phenology workspace.
//!
//! - [`PlotError`]: the error taxonomy surfaced to callers
//! - [`PlotTable`]: the columnar per-plot/per-date dataset
//! - [`BandTree`]: the date → plot → band array hierarchy
//! - date-token and CRS helpers

pub mod bbox;
pub mod crs;
pub mod error;
pub mod table;
pub mod time;
pub mod tree;

pub use bbox::BoundingBox;
pub use crs::epsg_code;
pub use error::{PlotError, PlotResult};
pub use table::{Column, ColumnData, PlotTable, DATE_COLUMN, ID_COLUMN};
pub use time::{date_token, day_offsets, parse_date_token};
pub use tree::{BandArray, BandTree, DateGroup, PlotGroup};
