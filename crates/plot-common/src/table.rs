//! Columnar per-plot/per-date dataset.
//!
//! A [`PlotTable`] holds one row per plot × date. Key columns are `id` and
//! `date` (text); band means and derived features are numeric columns where
//! NaN marks a missing value. Text columns use `None` for missing values.

use std::collections::{HashMap, HashSet};

use crate::error::{PlotError, PlotResult};

/// Name of the plot identifier column.
pub const ID_COLUMN: &str = "id";

/// Name of the date-token column.
pub const DATE_COLUMN: &str = "date";

/// Values of a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Number(Vec<f64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Number(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable string form of one cell, used as a join key.
    fn key(&self, row: usize) -> String {
        match self {
            ColumnData::Text(v) => v[row].clone().unwrap_or_default(),
            ColumnData::Number(v) => format!("{}", v[row]),
        }
    }

    /// Gather rows by index; `None` produces a missing value.
    fn take(&self, rows: &[Option<usize>]) -> ColumnData {
        match self {
            ColumnData::Text(v) => {
                ColumnData::Text(rows.iter().map(|r| r.and_then(|i| v[i].clone())).collect())
            }
            ColumnData::Number(v) => {
                ColumnData::Number(rows.iter().map(|r| r.map_or(f64::NAN, |i| v[i])).collect())
            }
        }
    }

    fn same_kind(&self, other: &ColumnData) -> bool {
        matches!(
            (self, other),
            (ColumnData::Text(_), ColumnData::Text(_)) | (ColumnData::Number(_), ColumnData::Number(_))
        )
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn numbers(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Number(values),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Columnar table with equal-length named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl PlotTable {
    /// Create an empty table with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from columns, checking lengths and name uniqueness.
    pub fn from_columns(columns: Vec<Column>) -> PlotResult<Self> {
        let mut table = Self::new();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Values of a text column.
    pub fn text(&self, name: &str) -> Option<&[Option<String>]> {
        match &self.column(name)?.data {
            ColumnData::Text(v) => Some(v),
            ColumnData::Number(_) => None,
        }
    }

    /// Values of a numeric column.
    pub fn numbers(&self, name: &str) -> Option<&[f64]> {
        match &self.column(name)?.data {
            ColumnData::Number(v) => Some(v),
            ColumnData::Text(_) => None,
        }
    }

    /// Append a column. The first column fixes the row count.
    pub fn push_column(&mut self, column: Column) -> PlotResult<()> {
        if self.has_column(&column.name) {
            return Err(PlotError::usage(format!(
                "column '{}' already exists",
                column.name
            )));
        }
        if self.columns.is_empty() {
            self.n_rows = column.len();
        } else if column.len() != self.n_rows {
            return Err(PlotError::usage(format!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.len(),
                self.n_rows
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Remove a column by name.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        let column = self.columns.remove(pos);
        if self.columns.is_empty() {
            self.n_rows = 0;
        }
        Some(column)
    }

    /// Stack another table's rows below this one.
    ///
    /// Both tables must have the same column names, order and kinds; an empty
    /// table (no columns) adopts the other table as-is.
    pub fn append(&mut self, other: PlotTable) -> PlotResult<()> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.columns.is_empty() {
            return Ok(());
        }

        let compatible = self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.name == b.name && a.data.same_kind(&b.data));
        if !compatible {
            return Err(PlotError::usage(format!(
                "cannot stack tables with columns {:?} and {:?}",
                self.column_names(),
                other.column_names()
            )));
        }

        for (mine, theirs) in self.columns.iter_mut().zip(other.columns) {
            match (&mut mine.data, theirs.data) {
                (ColumnData::Text(a), ColumnData::Text(b)) => a.extend(b),
                (ColumnData::Number(a), ColumnData::Number(b)) => a.extend(b),
                _ => unreachable!("column kinds checked above"),
            }
        }
        self.n_rows += other.n_rows;
        Ok(())
    }

    /// Distinct values of the `date` column in first-seen order.
    pub fn unique_dates(&self) -> Vec<String> {
        let Some(dates) = self.text(DATE_COLUMN) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        dates
            .iter()
            .flatten()
            .filter(|d| seen.insert(d.as_str()))
            .cloned()
            .collect()
    }

    fn key_columns(&self, on: &[&str]) -> PlotResult<Vec<&ColumnData>> {
        on.iter()
            .map(|name| {
                self.column(name)
                    .map(|c| &c.data)
                    .ok_or_else(|| PlotError::usage(format!("join column '{}' not found", name)))
            })
            .collect()
    }

    fn row_key(keys: &[&ColumnData], row: usize) -> Vec<String> {
        keys.iter().map(|k| k.key(row)).collect()
    }

    /// Left join `other` onto this table on the given key columns.
    ///
    /// Every row of `self` is kept, in order; rows with no match get missing
    /// values in the joined columns. Duplicate keys in `other` would multiply
    /// rows and are rejected with a Join error, as are non-key column names
    /// that already exist here.
    pub fn left_join(&self, other: &PlotTable, on: &[&str]) -> PlotResult<PlotTable> {
        let left_keys = self.key_columns(on)?;
        let right_keys = other.key_columns(on)?;

        let mut index: HashMap<Vec<String>, usize> = HashMap::with_capacity(other.n_rows);
        for row in 0..other.n_rows {
            let key = Self::row_key(&right_keys, row);
            if index.insert(key.clone(), row).is_some() {
                return Err(PlotError::Join(format!(
                    "key {:?} appears more than once in the joined table",
                    key
                )));
            }
        }

        let matches: Vec<Option<usize>> = (0..self.n_rows)
            .map(|row| index.get(&Self::row_key(&left_keys, row)).copied())
            .collect();

        let mut joined = self.clone();
        for column in other.columns.iter().filter(|c| !on.contains(&c.name.as_str())) {
            if joined.has_column(&column.name) {
                return Err(PlotError::usage(format!(
                    "column '{}' already exists in the table",
                    column.name
                )));
            }
            joined.push_column(Column {
                name: column.name.clone(),
                data: column.data.take(&matches),
            })?;
        }

        if joined.n_rows != self.n_rows {
            return Err(PlotError::Join(format!(
                "expected {} rows after join, found {}",
                self.n_rows, joined.n_rows
            )));
        }
        Ok(joined)
    }
}
