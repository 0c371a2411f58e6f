//! Folder-level extraction.
//!
//! Rasters are independent units: each one is extracted on its own and the
//! results are folded into one array tree and one summary table. Failures
//! are collected rather than aborting the batch.

use std::path::{Path, PathBuf};

use plot_common::{date_token, BandTree, Column, PlotError, PlotResult, PlotTable, ID_COLUMN};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ExtractionConfig;
use crate::extractor::{extract_raster, validate_band_names, ExtractionFailure, RasterExtraction};
use crate::grid::{read_grid, PlotGrid};

/// Result of processing a folder of rasters.
#[derive(Debug)]
pub struct BatchOutput {
    pub grid: PlotGrid,
    pub tree: BandTree,
    /// One row per extracted plot × date, grid attributes joined on id.
    /// Attributes named like an existing column get a `grid_` prefix.
    pub table: PlotTable,
    pub bands_name: Vec<String>,
    pub failures: Vec<ExtractionFailure>,
    /// Raster files skipped because their name carries no date token.
    pub skipped: Vec<PathBuf>,
}

/// Raster files directly inside `folder`, sorted by file name.
pub fn list_rasters(folder: impl AsRef<Path>, config: &ExtractionConfig) -> PlotResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder.as_ref())
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| PlotError::Io(e.into()))?;
        let is_raster = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| config.is_raster_extension(e));
        if entry.file_type().is_file() && is_raster {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Extract every plot of the grid from every raster in `folder`.
pub fn process_folder(
    folder: impl AsRef<Path>,
    grid_path: impl AsRef<Path>,
    id_column: &str,
    band_names: Option<&[String]>,
    config: &ExtractionConfig,
) -> PlotResult<BatchOutput> {
    config.validate().map_err(PlotError::usage)?;
    if let Some(names) = band_names {
        validate_band_names(names)?;
    }
    let folder = folder.as_ref();
    let grid = read_grid(grid_path, id_column)?;
    let files = list_rasters(folder, config)?;

    let mut tree = BandTree::new();
    let mut table = PlotTable::new();
    let mut bands_name: Option<Vec<String>> = None;
    let mut failures = Vec::new();
    let mut skipped = Vec::new();

    for (pos, path) in files.iter().enumerate() {
        info!("{}/{} : {}", pos + 1, files.len(), path.display());

        let Some(date) = date_token(path) else {
            warn!(file = %path.display(), "Raster name has no date token, skipping");
            skipped.push(path.clone());
            continue;
        };
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if tree.contains_date(&date) {
            let error = PlotError::raster(&file, format!("date '{}' was already extracted", date));
            warn!(file = %file, error = %error, "Raster skipped");
            failures.push(ExtractionFailure::raster(file, error));
            continue;
        }

        let extraction = match extract_raster(path, &grid, band_names, config) {
            Ok(extraction) => extraction,
            Err(error) => {
                warn!(file = %file, error = %error, "Raster extraction failed");
                failures.push(ExtractionFailure::raster(file, error));
                continue;
            }
        };

        if let Err(error) = merge(&mut tree, &mut table, &mut bands_name, extraction, &mut failures) {
            warn!(file = %file, error = %error, "Raster could not be merged");
            failures.push(ExtractionFailure::raster(file, error));
        }
    }

    let Some(bands_name) = bands_name else {
        let reason = match failures.first() {
            Some(first) => format!(
                "no raster in the folder produced any plot (first failure in '{}': {})",
                first.file, first.error
            ),
            None => "no raster in the folder produced any plot".to_string(),
        };
        return Err(PlotError::raster(folder.display().to_string(), reason));
    };

    if let Some(attributes) = &grid.attributes {
        table = table.left_join(&disambiguate(attributes, &table)?, &[ID_COLUMN])?;
    }

    info!(
        rasters = files.len(),
        dates = tree.dates().len(),
        rows = table.n_rows(),
        failures = failures.len(),
        "Folder processed"
    );

    Ok(BatchOutput {
        grid,
        tree,
        table,
        bands_name,
        failures,
        skipped,
    })
}

/// Prefix grid attribute columns whose names are already taken in `table`.
fn disambiguate(attributes: &PlotTable, table: &PlotTable) -> PlotResult<PlotTable> {
    let taken = |name: &str, own: &str| {
        table.has_column(name) || (name != own && attributes.has_column(name))
    };
    let mut renamed = PlotTable::new();
    for column in attributes.columns() {
        let mut name = column.name.clone();
        if name != ID_COLUMN {
            while taken(&name, &column.name) {
                name = format!("grid_{}", name);
            }
            if name != column.name {
                warn!(attribute = %column.name, column = %name, "Grid attribute renamed");
            }
        }
        renamed.push_column(Column {
            name,
            data: column.data.clone(),
        })?;
    }
    Ok(renamed)
}

/// Fold one raster's results into the batch.
fn merge(
    tree: &mut BandTree,
    table: &mut PlotTable,
    bands_name: &mut Option<Vec<String>>,
    extraction: RasterExtraction,
    failures: &mut Vec<ExtractionFailure>,
) -> PlotResult<()> {
    if extraction.summaries.is_empty() {
        failures.extend(extraction.failures);
        return Ok(());
    }
    if let Some(names) = bands_name.as_ref() {
        if *names != extraction.bands_name {
            return Err(PlotError::raster(
                &extraction.file,
                format!(
                    "bands {:?} differ from the bands {:?} of earlier rasters",
                    extraction.bands_name, names
                ),
            ));
        }
    }

    let rows = extraction.summary_table()?;
    table.append(rows)?;
    tree.insert_date(extraction.arrays)?;
    failures.extend(extraction.failures);
    if bands_name.is_none() {
        *bands_name = Some(extraction.bands_name);
    }
    Ok(())
}
