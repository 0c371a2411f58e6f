//! Per-plot feature generation over the band tree.

use std::collections::HashSet;

use plot_common::{BandArray, BandTree, Column, PlotError, PlotResult, PlotTable, DATE_COLUMN, ID_COLUMN};
use tracing::debug;

/// The bands of one plot at one date, in project band order.
#[derive(Debug, Clone)]
pub struct PlotBands<'a> {
    pub id: &'a str,
    pub date: &'a str,
    bands: Vec<(&'a str, &'a BandArray)>,
}

impl<'a> PlotBands<'a> {
    /// Array of band `name`.
    pub fn get(&self, name: &str) -> PlotResult<&'a BandArray> {
        self.bands
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, a)| *a)
            .ok_or_else(|| {
                PlotError::usage(format!(
                    "band '{}' not found for plot '{}' at {}",
                    name, self.id, self.date
                ))
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.bands.iter().map(|(n, _)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a BandArray)> + '_ {
        self.bands.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// Check a list of feature names.
pub fn validate_names<S: AsRef<str>>(names: &[S]) -> PlotResult<Vec<String>> {
    if names.is_empty() {
        return Err(PlotError::usage("feature names must not be empty"));
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        if name.trim().is_empty() {
            return Err(PlotError::usage("feature names must not be blank"));
        }
        if name == ID_COLUMN || name == DATE_COLUMN {
            return Err(PlotError::usage(format!(
                "'{}' is a reserved column name",
                name
            )));
        }
        if !seen.insert(name) {
            return Err(PlotError::usage(format!(
                "feature name '{}' is given twice",
                name
            )));
        }
        out.push(name.to_string());
    }
    Ok(out)
}

/// Call `f` on every plot of every date and collect one row per call.
///
/// The table has `id`, `date`, then one numeric column per name.
pub fn collect_features<F>(
    tree: &BandTree,
    bands_name: &[String],
    names: &[String],
    mut f: F,
) -> PlotResult<PlotTable>
where
    F: FnMut(&PlotBands<'_>) -> Vec<f64>,
{
    let mut ids = Vec::new();
    let mut dates = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for date in tree.dates() {
        for plot in date.plots() {
            let bands = bands_name
                .iter()
                .map(|name| {
                    plot.band(name).map(|a| (name.as_str(), a)).ok_or_else(|| {
                        PlotError::Store(format!(
                            "band '{}' missing for plot '{}' at {}",
                            name, plot.id, date.date
                        ))
                    })
                })
                .collect::<PlotResult<Vec<_>>>()?;
            let input = PlotBands {
                id: &plot.id,
                date: &date.date,
                bands,
            };

            let row = f(&input);
            if row.len() != names.len() {
                return Err(PlotError::usage(format!(
                    "feature function returned {} values for plot '{}' at {}, expected {}",
                    row.len(),
                    plot.id,
                    date.date,
                    names.len()
                )));
            }
            for (column, value) in values.iter_mut().zip(row) {
                column.push(value);
            }
            ids.push(Some(plot.id.clone()));
            dates.push(Some(date.date.clone()));
        }
    }
    debug!(rows = ids.len(), features = names.len(), "Features generated");

    let mut columns = vec![Column::text(ID_COLUMN, ids), Column::text(DATE_COLUMN, dates)];
    columns.extend(
        names
            .iter()
            .zip(values)
            .map(|(name, values)| Column::numbers(name.clone(), values)),
    );
    PlotTable::from_columns(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use plot_common::{DateGroup, PlotGroup};

    fn tree() -> BandTree {
        let mut tree = BandTree::new();
        let mut date = DateGroup::new("20200101");
        for (id, red, nir) in [("A1", 0.2f32, 0.6f32), ("A2", 0.1, 0.3)] {
            let mut plot = PlotGroup::new(id);
            // Stored in a different order than the project band order.
            plot.insert_band("nir", Array2::from_elem((2, 2), nir)).unwrap();
            plot.insert_band("red", Array2::from_elem((2, 2), red)).unwrap();
            date.insert_plot(plot).unwrap();
        }
        tree.insert_date(date).unwrap();
        tree
    }

    fn bands() -> Vec<String> {
        vec!["red".to_string(), "nir".to_string()]
    }

    #[test]
    fn test_bands_follow_project_order() {
        let mut seen = Vec::new();
        collect_features(&tree(), &bands(), &["n".to_string()], |plot| {
            seen.push(plot.names().collect::<Vec<_>>().join(","));
            vec![plot.len() as f64]
        })
        .unwrap();
        assert_eq!(seen, vec!["red,nir", "red,nir"]);
    }

    #[test]
    fn test_collect_ndvi() {
        let names = vec!["ndvi".to_string()];
        let table = collect_features(&tree(), &bands(), &names, |plot| {
            let red = plot.get("red").unwrap().mean().unwrap_or(0.0) as f64;
            let nir = plot.get("nir").unwrap().mean().unwrap_or(0.0) as f64;
            vec![(nir - red) / (nir + red)]
        })
        .unwrap();
        assert_eq!(table.column_names(), vec!["id", "date", "ndvi"]);
        let ndvi = table.numbers("ndvi").unwrap();
        assert!((ndvi[0] - 0.5).abs() < 1e-6);
        assert!((ndvi[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_wrong_value_count_is_usage_error() {
        let names = vec!["a".to_string(), "b".to_string()];
        let err = collect_features(&tree(), &bands(), &names, |_| vec![1.0]).unwrap_err();
        assert!(matches!(err, PlotError::Usage(msg) if msg.contains("A1")));
    }

    #[test]
    fn test_unknown_band() {
        collect_features(&tree(), &bands(), &["x".to_string()], |plot| {
            assert!(plot.get("swir").is_err());
            vec![0.0]
        })
        .unwrap();
    }

    #[test]
    fn test_validate_names() {
        assert_eq!(validate_names(&["ndvi", "gli"]).unwrap(), vec!["ndvi", "gli"]);
        assert!(validate_names::<&str>(&[]).is_err());
        assert!(validate_names(&["ndvi", "ndvi"]).is_err());
        assert!(validate_names(&[" "]).is_err());
        assert!(validate_names(&["date"]).is_err());
    }
}
