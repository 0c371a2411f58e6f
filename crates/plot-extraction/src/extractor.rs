//! Per-raster plot extraction.

use std::collections::HashSet;
use std::path::Path;

use geotiff_reader::{read_raster, Raster};
use plot_common::crs::same_epsg;
use plot_common::{
    date_token, Column, DateGroup, PlotError, PlotGroup, PlotResult, PlotTable, DATE_COLUMN,
    ID_COLUMN,
};
use tracing::{debug, info, warn};

use crate::align::auto_fit;
use crate::config::ExtractionConfig;
use crate::grid::{PlotGrid, PlotPolygon};
use crate::mask::mask_plot;

/// Band means of one plot at one date.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSummary {
    /// 1-based position of the plot in the grid.
    pub plot_index: usize,
    pub plot_id: String,
    pub date: String,
    /// One mean per true band, in band-name order.
    pub means: Vec<f64>,
}

/// A plot or raster that could not be extracted.
#[derive(Debug)]
pub struct ExtractionFailure {
    pub file: String,
    /// `None` when the whole raster failed.
    pub plot: Option<String>,
    pub error: PlotError,
}

impl ExtractionFailure {
    pub fn raster(file: impl Into<String>, error: PlotError) -> Self {
        Self {
            file: file.into(),
            plot: None,
            error,
        }
    }
}

/// Everything extracted from one raster file.
#[derive(Debug)]
pub struct RasterExtraction {
    pub file: String,
    pub date: String,
    pub bands_name: Vec<String>,
    pub summaries: Vec<PlotSummary>,
    pub arrays: DateGroup,
    pub failures: Vec<ExtractionFailure>,
}

impl RasterExtraction {
    /// Summary rows as a table: `id`, `date`, then one column per band.
    pub fn summary_table(&self) -> PlotResult<PlotTable> {
        summary_table(&self.summaries, &self.bands_name)
    }
}

/// `band_1, band_2, …` for `n` bands.
pub fn default_band_names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("band_{}", i)).collect()
}

/// Reject band names that would collide in the summary table.
pub fn validate_band_names(names: &[String]) -> PlotResult<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if name.trim().is_empty() {
            return Err(PlotError::usage("band names must not be blank"));
        }
        if name == ID_COLUMN || name == DATE_COLUMN {
            return Err(PlotError::usage(format!(
                "band name '{}' is a reserved column name",
                name
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(PlotError::usage(format!(
                "band name '{}' is given twice",
                name
            )));
        }
    }
    Ok(())
}

/// Build the summary table for a set of rows sharing `bands_name`.
pub fn summary_table(summaries: &[PlotSummary], bands_name: &[String]) -> PlotResult<PlotTable> {
    let mut columns = vec![
        Column::text(
            ID_COLUMN,
            summaries.iter().map(|s| Some(s.plot_id.clone())).collect(),
        ),
        Column::text(
            DATE_COLUMN,
            summaries.iter().map(|s| Some(s.date.clone())).collect(),
        ),
    ];
    for (band, name) in bands_name.iter().enumerate() {
        columns.push(Column::numbers(
            name.clone(),
            summaries
                .iter()
                .map(|s| s.means.get(band).copied().unwrap_or(f64::NAN))
                .collect(),
        ));
    }
    PlotTable::from_columns(columns)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract every plot of `grid` from one raster.
///
/// Failures of individual plots are collected in the result; an error is
/// returned only when the raster as a whole cannot be used.
pub fn extract_raster(
    path: impl AsRef<Path>,
    grid: &PlotGrid,
    band_names: Option<&[String]>,
    config: &ExtractionConfig,
) -> PlotResult<RasterExtraction> {
    let path = path.as_ref();
    let file = file_label(path);
    let date = date_token(path)
        .ok_or_else(|| PlotError::raster(&file, "file name has no '<date>_' prefix"))?;

    let raster = read_raster(path).map_err(|e| PlotError::raster(&file, e.to_string()))?;
    report_crs(&raster, grid, &file);

    let n_true = raster.true_band_indices().len();
    let bands_name = match band_names {
        Some(names) if names.len() != n_true => {
            return Err(PlotError::raster(
                &file,
                format!(
                    "{} band names given for {} bands",
                    names.len(),
                    n_true
                ),
            ));
        }
        Some(names) => names.to_vec(),
        None => default_band_names(n_true),
    };
    validate_band_names(&bands_name)?;

    let mut summaries = Vec::with_capacity(grid.len());
    let mut arrays = DateGroup::new(date.clone());
    let mut failures = Vec::new();

    for (index, plot) in grid.plots.iter().enumerate() {
        match extract_plot(&raster, plot, &bands_name, &file, config) {
            Ok((means, group)) => {
                arrays.insert_plot(group)?;
                summaries.push(PlotSummary {
                    plot_index: index + 1,
                    plot_id: plot.id.clone(),
                    date: date.clone(),
                    means,
                });
            }
            Err(error) => {
                warn!(file = %file, plot = %plot.id, error = %error, "Plot extraction failed");
                failures.push(ExtractionFailure {
                    file: file.clone(),
                    plot: Some(plot.id.clone()),
                    error,
                });
            }
        }
    }

    debug!(
        file = %file,
        extracted = summaries.len(),
        failed = failures.len(),
        "Raster extracted"
    );

    Ok(RasterExtraction {
        file,
        date,
        bands_name,
        summaries,
        arrays,
        failures,
    })
}

fn report_crs(raster: &Raster, grid: &PlotGrid, file: &str) {
    let raster_crs = raster.crs.as_deref().unwrap_or("unknown");
    let grid_crs = grid.crs.as_deref().unwrap_or("unknown");
    info!(file = %file, raster_crs, grid_crs, "Coordinate systems");
    if same_epsg(raster_crs, grid_crs) == Some(false) {
        warn!(file = %file, raster_crs, grid_crs, "Raster and grid CRS differ");
    }
}

/// Mask, align and average every true band of one plot.
fn extract_plot(
    raster: &Raster,
    plot: &PlotPolygon,
    bands_name: &[String],
    file: &str,
    config: &ExtractionConfig,
) -> PlotResult<(Vec<f64>, PlotGroup)> {
    let masked = mask_plot(raster, plot, file)?;
    let alignment =
        auto_fit(&masked.mask, config).map_err(|f| PlotError::alignment(&plot.id, f.to_string()))?;

    let mut group = PlotGroup::new(plot.id.clone());
    let mut means = Vec::with_capacity(bands_name.len());
    for (name, band) in bands_name.iter().zip(&masked.bands) {
        let aligned = alignment
            .apply(band)
            .map_err(|f| PlotError::alignment(&plot.id, f.to_string()))?;
        let mean = aligned.iter().map(|v| f64::from(*v)).sum::<f64>() / aligned.len() as f64;
        means.push(mean);
        group.insert_band(name.clone(), aligned)?;
    }
    Ok((means, group))
}
