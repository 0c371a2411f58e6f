//! The project aggregate: extracted arrays plus the summary table.

use std::collections::HashMap;
use std::path::Path;

use plot_common::{
    day_offsets, BandTree, Column, PlotError, PlotResult, PlotTable, DATE_COLUMN, ID_COLUMN,
};
use plot_extraction::{process_folder, ExtractionConfig, ExtractionFailure, PlotGrid};
use plot_store::{load_archive, save_archive, StoreBackend, StoreConfig, ZarrBackend};
use tracing::{debug, info};

use crate::crossing::{estimate_crossing, CrossingEstimate};
use crate::feature::{collect_features, validate_names, PlotBands};

/// Column receiving the predicted crossing day on merge.
pub const CROSSING_DAY_COLUMN: &str = "crossing_day";
/// Column receiving the range tag on merge.
pub const CROSSING_RANGE_COLUMN: &str = "crossing_range";

/// Per-plot, per-date extraction results.
///
/// `dates` is always the first-seen order of the `date` column of `ldata`,
/// whether the project was extracted or loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    raw_data: BandTree,
    ldata: PlotTable,
    dates: Vec<String>,
    bands_name: Vec<String>,
}

/// A freshly extracted project and what could not be extracted.
#[derive(Debug)]
pub struct Extraction {
    pub project: Project,
    pub grid: PlotGrid,
    pub failures: Vec<ExtractionFailure>,
    /// Raster files without a date token.
    pub skipped: Vec<std::path::PathBuf>,
}

/// A named project attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectField<'a> {
    RawData(&'a BandTree),
    Ldata(&'a PlotTable),
    Dates(&'a [String]),
    NDates(usize),
    BandsName(&'a [String]),
    NBands(usize),
}

impl Project {
    /// Assemble a project from its parts.
    pub fn new(raw_data: BandTree, ldata: PlotTable, bands_name: Vec<String>) -> Self {
        let dates = ldata.unique_dates();
        Self {
            raw_data,
            ldata,
            dates,
            bands_name,
        }
    }

    /// Extract every plot of `grid` from every dated raster in `folder`,
    /// using settings from the environment.
    pub fn extract(
        folder: impl AsRef<Path>,
        grid: impl AsRef<Path>,
        id_column: &str,
        band_names: Option<&[String]>,
    ) -> PlotResult<Extraction> {
        Self::extract_with_config(
            folder,
            grid,
            id_column,
            band_names,
            &ExtractionConfig::from_env(),
        )
    }

    pub fn extract_with_config(
        folder: impl AsRef<Path>,
        grid: impl AsRef<Path>,
        id_column: &str,
        band_names: Option<&[String]>,
        config: &ExtractionConfig,
    ) -> PlotResult<Extraction> {
        let output = process_folder(folder, grid, id_column, band_names, config)?;
        let project = Self::new(output.tree, output.table, output.bands_name);
        info!(
            dates = project.n_dates(),
            bands = project.n_bands(),
            rows = project.ldata.n_rows(),
            failures = output.failures.len(),
            "Project extracted"
        );
        Ok(Extraction {
            project,
            grid: output.grid,
            failures: output.failures,
            skipped: output.skipped,
        })
    }

    /// Persist the project as a Zarr archive at `path`.
    pub fn save(&self, path: impl AsRef<Path>, config: &StoreConfig) -> PlotResult<()> {
        let mut backend = ZarrBackend::create(path, config.clone())?;
        self.save_to(&mut backend)
    }

    /// Load a project saved with [`Project::save`].
    pub fn load(path: impl AsRef<Path>) -> PlotResult<Self> {
        let backend = ZarrBackend::open(path)?;
        Self::load_from(&backend)
    }

    pub fn save_to<B: StoreBackend + ?Sized>(&self, backend: &mut B) -> PlotResult<()> {
        save_archive(backend, &self.raw_data, &self.bands_name, &self.ldata)?;
        Ok(())
    }

    pub fn load_from<B: StoreBackend + ?Sized>(backend: &B) -> PlotResult<Self> {
        let archive = load_archive(backend)?;
        Ok(Self::new(archive.tree, archive.table, archive.bands_name))
    }

    pub fn raw_data(&self) -> &BandTree {
        &self.raw_data
    }

    pub fn ldata(&self) -> &PlotTable {
        &self.ldata
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn bands_name(&self) -> &[String] {
        &self.bands_name
    }

    pub fn n_bands(&self) -> usize {
        self.bands_name.len()
    }

    /// Look up an attribute by name.
    pub fn field(&self, name: &str) -> PlotResult<ProjectField<'_>> {
        match name {
            "raw_data" => Ok(ProjectField::RawData(&self.raw_data)),
            "ldata" => Ok(ProjectField::Ldata(&self.ldata)),
            "dates" => Ok(ProjectField::Dates(&self.dates)),
            "n_dates" => Ok(ProjectField::NDates(self.n_dates())),
            "bands_name" => Ok(ProjectField::BandsName(&self.bands_name)),
            "n_bands" => Ok(ProjectField::NBands(self.n_bands())),
            other => Err(PlotError::FieldNotFound(other.to_string())),
        }
    }

    /// Compute features from the band arrays of every plot and date.
    ///
    /// `f` receives the bands of one plot and must return one value per
    /// name. With `merge`, the features are left-joined onto `ldata` on
    /// (id, date); rows without features keep NaN.
    pub fn generate_feature<F, S>(&mut self, f: F, names: &[S], merge: bool) -> PlotResult<PlotTable>
    where
        F: FnMut(&PlotBands<'_>) -> Vec<f64>,
        S: AsRef<str>,
    {
        let names = validate_names(names)?;
        let features = collect_features(&self.raw_data, &self.bands_name, &names, f)?;
        if merge {
            self.ldata = self.ldata.left_join(&features, &[ID_COLUMN, DATE_COLUMN])?;
            debug!(columns = ?names, "Features merged");
        }
        Ok(features)
    }

    /// Estimate, per plot, the day `column` falls to `threshold`.
    ///
    /// Days count from the earliest date in `ldata`; with `from_day`, points
    /// on or before that day are ignored. With `merge`, the estimates are
    /// joined onto every row of the plot as `crossing_day` and
    /// `crossing_range`, replacing earlier estimates.
    pub fn estimate_threshold_crossing(
        &mut self,
        column: &str,
        threshold: f64,
        merge: bool,
        from_day: Option<i64>,
    ) -> PlotResult<Vec<CrossingEstimate>> {
        let values = self
            .ldata
            .numbers(column)
            .ok_or_else(|| PlotError::usage(format!("'{}' is not a numeric column of ldata", column)))?;
        let ids = required_text(&self.ldata, ID_COLUMN)?;
        let dates = required_text(&self.ldata, DATE_COLUMN)?;
        let days = day_offsets(&dates)?;

        let mut order: Vec<&str> = Vec::new();
        let mut series: HashMap<&str, Vec<(i64, f64)>> = HashMap::new();
        for ((id, day), value) in ids.iter().zip(days).zip(values) {
            if from_day.is_some_and(|from| day <= from) {
                continue;
            }
            series
                .entry(*id)
                .or_insert_with(|| {
                    order.push(*id);
                    Vec::new()
                })
                .push((day, *value));
        }
        // Plots whose every point was filtered out still get a row.
        for id in &ids {
            if !series.contains_key(id) {
                series.insert(*id, Vec::new());
                order.push(*id);
            }
        }

        let estimates: Vec<CrossingEstimate> = order
            .iter()
            .map(|id| {
                let mut points = series.remove(id).unwrap_or_default();
                points.sort_by_key(|&(day, _)| day);
                let (predicted_day, range) = estimate_crossing(&points, threshold);
                CrossingEstimate {
                    id: id.to_string(),
                    start_day: points.first().map(|&(day, _)| day),
                    predicted_day,
                    range,
                }
            })
            .collect();
        debug!(column, threshold, plots = estimates.len(), "Threshold crossings estimated");

        if merge {
            self.merge_crossings(&estimates)?;
        }
        Ok(estimates)
    }

    fn merge_crossings(&mut self, estimates: &[CrossingEstimate]) -> PlotResult<()> {
        let table = PlotTable::from_columns(vec![
            Column::text(ID_COLUMN, estimates.iter().map(|e| Some(e.id.clone())).collect()),
            Column::numbers(
                CROSSING_DAY_COLUMN,
                estimates
                    .iter()
                    .map(|e| e.predicted_day.map_or(f64::NAN, |d| d as f64))
                    .collect(),
            ),
            Column::text(
                CROSSING_RANGE_COLUMN,
                estimates
                    .iter()
                    .map(|e| e.range.tag().map(str::to_string))
                    .collect(),
            ),
        ])?;

        let mut ldata = self.ldata.clone();
        ldata.remove_column(CROSSING_DAY_COLUMN);
        ldata.remove_column(CROSSING_RANGE_COLUMN);
        self.ldata = ldata.left_join(&table, &[ID_COLUMN])?;
        Ok(())
    }
}

fn required_text<'a>(table: &'a PlotTable, name: &str) -> PlotResult<Vec<&'a str>> {
    let column = table
        .text(name)
        .ok_or_else(|| PlotError::usage(format!("ldata has no text column '{}'", name)))?;
    column
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.as_deref()
                .ok_or_else(|| PlotError::usage(format!("row {} has no '{}' value", row, name)))
        })
        .collect()
}
