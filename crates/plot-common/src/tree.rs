//! In-memory date → plot → band hierarchy of extracted arrays.
//!
//! Every level keeps insertion order and rejects duplicate keys, mirroring
//! the group semantics of the persisted store.

use ndarray::Array2;

use crate::error::{PlotError, PlotResult};

/// One aligned, cropped band of one plot at one date ([row, col]).
pub type BandArray = Array2<f32>;

/// All bands of one plot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotGroup {
    pub id: String,
    bands: Vec<(String, BandArray)>,
}

impl PlotGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bands: Vec::new(),
        }
    }

    /// Add a band; a band name may only appear once per plot.
    pub fn insert_band(&mut self, name: impl Into<String>, array: BandArray) -> PlotResult<()> {
        let name = name.into();
        if self.band(&name).is_some() {
            return Err(PlotError::Store(format!(
                "band '{}' already exists for plot '{}'",
                name, self.id
            )));
        }
        self.bands.push((name, array));
        Ok(())
    }

    pub fn band(&self, name: &str) -> Option<&BandArray> {
        self.bands.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn bands(&self) -> impl Iterator<Item = (&str, &BandArray)> {
        self.bands.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }
}

/// All plots extracted from one flight date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup {
    pub date: String,
    plots: Vec<PlotGroup>,
}

impl DateGroup {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            plots: Vec::new(),
        }
    }

    /// Add a plot group; fails if the plot id already exists for this date.
    pub fn insert_plot(&mut self, plot: PlotGroup) -> PlotResult<()> {
        if self.plot(&plot.id).is_some() {
            return Err(PlotError::Store(format!(
                "plot '{}' already exists for date '{}'",
                plot.id, self.date
            )));
        }
        self.plots.push(plot);
        Ok(())
    }

    pub fn plot(&self, id: &str) -> Option<&PlotGroup> {
        self.plots.iter().find(|p| p.id == id)
    }

    pub fn plots(&self) -> &[PlotGroup] {
        &self.plots
    }

    pub fn n_plots(&self) -> usize {
        self.plots.len()
    }
}

/// The full array hierarchy of a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandTree {
    dates: Vec<DateGroup>,
}

impl BandTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a date group; fails if the date key already exists.
    pub fn insert_date(&mut self, group: DateGroup) -> PlotResult<()> {
        if self.contains_date(&group.date) {
            return Err(PlotError::Store(format!(
                "date '{}' already exists in the store",
                group.date
            )));
        }
        self.dates.push(group);
        Ok(())
    }

    pub fn contains_date(&self, date: &str) -> bool {
        self.date(date).is_some()
    }

    pub fn date(&self, date: &str) -> Option<&DateGroup> {
        self.dates.iter().find(|d| d.date == date)
    }

    pub fn dates(&self) -> &[DateGroup] {
        &self.dates
    }

    /// Date keys in insertion order.
    pub fn date_keys(&self) -> Vec<&str> {
        self.dates.iter().map(|d| d.date.as_str()).collect()
    }

    /// Look up a single array.
    pub fn get(&self, date: &str, plot: &str, band: &str) -> Option<&BandArray> {
        self.date(date)?.plot(plot)?.band(band)
    }

    /// Total number of stored arrays.
    pub fn n_arrays(&self) -> usize {
        self.dates
            .iter()
            .flat_map(|d| d.plots.iter())
            .map(|p| p.n_bands())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
