//! Archive layout: the band tree, band names and summary table in one store.
//!
//! ```text
//! /                               group
//! /dates                          group, attr `children`
//! /dates/<date>                   group, attr `children`
//! /dates/<date>/<plot>            group, attr `children`
//! /dates/<date>/<plot>/<band>     float32 [rows, cols]
//! /bands_name                     group, attr `values`
//! /ldata                          group, attrs `n_rows`, `columns`
//! /ldata/c<i>                     float64 [n_rows] for a numeric column, or
//!                                 uint8 UTF-8 bytes for a text column
//! /ldata/c<i>_len                 int64 [n_rows] byte length per text cell,
//!                                 -1 when missing
//! ```
//!
//! Groups are created once and never recreated; arrays and attributes are
//! overwritten on every save. `children` lists are rewritten to the saved
//! tree, so nodes of an earlier save become unreachable.

use plot_common::{BandTree, Column, ColumnData, DateGroup, PlotGroup, PlotTable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::backend::{child_path, Attributes, StoreBackend};
use crate::error::{StoreError, StoreResult};

pub const ROOT: &str = "/";
pub const DATES_KEY: &str = "/dates";
pub const BANDS_NAME_KEY: &str = "/bands_name";
pub const LDATA_KEY: &str = "/ldata";

const CHILDREN_ATTR: &str = "children";
const VALUES_ATTR: &str = "values";
const N_ROWS_ATTR: &str = "n_rows";
const COLUMNS_ATTR: &str = "columns";

/// Everything a store holds, materialized in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    pub tree: BandTree,
    pub bands_name: Vec<String>,
    pub table: PlotTable,
}

/// Description of one `ldata` column in the group attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ColumnEntry {
    Number { name: String, array: String },
    Text { name: String, array: String, lengths: String },
}

/// Check that `name` can be used as a single node name.
pub fn validate_node_name(name: &str) -> StoreResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains('/') {
        Some("name contains '/'")
    } else if name.starts_with("__") {
        Some("names starting with '__' are reserved")
    } else if name == "." || name == ".." {
        Some("relative path component")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Whether both reserved keys exist, i.e. the store was saved before.
pub fn is_initialized<B: StoreBackend + ?Sized>(backend: &B) -> bool {
    backend.node_exists(BANDS_NAME_KEY) && backend.node_exists(LDATA_KEY)
}

fn ensure_group<B: StoreBackend + ?Sized>(backend: &mut B, path: &str) -> StoreResult<()> {
    if !backend.node_exists(path) {
        backend.create_group(path)?;
    }
    Ok(())
}

fn children<B: StoreBackend + ?Sized>(backend: &B, path: &str) -> StoreResult<Vec<String>> {
    let attrs = backend.group_attributes(path)?;
    string_list(&attrs, CHILDREN_ATTR, path)
}

/// Record exactly `names` as the children of `path`.
fn write_children<B: StoreBackend + ?Sized>(
    backend: &mut B,
    path: &str,
    names: &[&str],
) -> StoreResult<()> {
    let mut attrs = backend.group_attributes(path)?;
    attrs.insert(CHILDREN_ATTR.to_string(), serde_json::json!(names));
    backend.write_group_attributes(path, attrs)
}

fn string_list(attrs: &Attributes, key: &str, path: &str) -> StoreResult<Vec<String>> {
    let value = attrs
        .get(key)
        .ok_or_else(|| StoreError::MissingKey(format!("{}@{}", path, key)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| StoreError::format(path, format!("attribute '{}': {}", key, e)))
}

/// Write `tree`, `bands_name` and `table` into `backend`.
///
/// On a fresh store every group is created; on a store saved before, the
/// existing groups are reused and their contents overwritten.
pub fn save_archive<B: StoreBackend + ?Sized>(
    backend: &mut B,
    tree: &BandTree,
    bands_name: &[String],
    table: &PlotTable,
) -> StoreResult<()> {
    let first_write = !is_initialized(backend);
    info!(
        backend = backend.name(),
        first_write,
        dates = tree.dates().len(),
        rows = table.n_rows(),
        "Saving archive"
    );

    if first_write {
        ensure_group(backend, ROOT)?;
        ensure_group(backend, BANDS_NAME_KEY)?;
        ensure_group(backend, LDATA_KEY)?;
    }

    save_tree(backend, tree)?;
    save_bands_name(backend, bands_name)?;
    save_table(backend, table)?;
    Ok(())
}

fn save_tree<B: StoreBackend + ?Sized>(backend: &mut B, tree: &BandTree) -> StoreResult<()> {
    ensure_group(backend, DATES_KEY)?;
    for date in tree.dates() {
        validate_node_name(&date.date)?;
        let date_path = child_path(DATES_KEY, &date.date);
        ensure_group(backend, &date_path)?;

        for plot in date.plots() {
            validate_node_name(&plot.id)?;
            let plot_path = child_path(&date_path, &plot.id);
            ensure_group(backend, &plot_path)?;

            for (band, array) in plot.bands() {
                validate_node_name(band)?;
                backend.write_f32_array(&child_path(&plot_path, band), array)?;
            }
            write_children(backend, &plot_path, &plot.band_names())?;
        }

        let plot_ids: Vec<&str> = date.plots().iter().map(|p| p.id.as_str()).collect();
        write_children(backend, &date_path, &plot_ids)?;
        debug!(date = %date.date, plots = plot_ids.len(), "Saved date group");
    }
    write_children(backend, DATES_KEY, &tree.date_keys())
}

fn save_bands_name<B: StoreBackend + ?Sized>(
    backend: &mut B,
    bands_name: &[String],
) -> StoreResult<()> {
    let mut attrs = Attributes::new();
    attrs.insert(VALUES_ATTR.to_string(), serde_json::json!(bands_name));
    backend.write_group_attributes(BANDS_NAME_KEY, attrs)
}

fn save_table<B: StoreBackend + ?Sized>(backend: &mut B, table: &PlotTable) -> StoreResult<()> {
    let mut entries = Vec::with_capacity(table.n_columns());
    for (i, column) in table.columns().iter().enumerate() {
        let entry = match &column.data {
            ColumnData::Number(values) => {
                let array = format!("c{}", i);
                backend.write_f64_array(&child_path(LDATA_KEY, &array), values)?;
                ColumnEntry::Number {
                    name: column.name.clone(),
                    array,
                }
            }
            ColumnData::Text(values) => {
                let array = format!("c{}", i);
                let lengths = format!("c{}_len", i);
                let (bytes, sizes) = encode_text(values);
                backend.write_u8_array(&child_path(LDATA_KEY, &array), &bytes)?;
                backend.write_i64_array(&child_path(LDATA_KEY, &lengths), &sizes)?;
                ColumnEntry::Text {
                    name: column.name.clone(),
                    array,
                    lengths,
                }
            }
        };
        entries.push(entry);
    }

    let columns = serde_json::to_value(&entries)
        .map_err(|e| StoreError::format(LDATA_KEY, e.to_string()))?;
    let mut attrs = Attributes::new();
    attrs.insert(N_ROWS_ATTR.to_string(), Value::from(table.n_rows()));
    attrs.insert(COLUMNS_ATTR.to_string(), columns);
    backend.write_group_attributes(LDATA_KEY, attrs)
}

/// Read a whole archive back into memory.
pub fn load_archive<B: StoreBackend + ?Sized>(backend: &B) -> StoreResult<Archive> {
    for key in [BANDS_NAME_KEY, LDATA_KEY] {
        if !backend.node_exists(key) {
            return Err(StoreError::MissingKey(key.to_string()));
        }
    }

    let bands_name = string_list(&backend.group_attributes(BANDS_NAME_KEY)?, VALUES_ATTR, BANDS_NAME_KEY)?;
    let table = load_table(backend)?;
    let tree = if backend.node_exists(DATES_KEY) {
        load_tree(backend)?
    } else {
        BandTree::new()
    };

    info!(
        backend = backend.name(),
        dates = tree.dates().len(),
        arrays = tree.n_arrays(),
        rows = table.n_rows(),
        "Loaded archive"
    );
    Ok(Archive {
        tree,
        bands_name,
        table,
    })
}

fn load_tree<B: StoreBackend + ?Sized>(backend: &B) -> StoreResult<BandTree> {
    let mut tree = BandTree::new();
    for date in children(backend, DATES_KEY)? {
        let date_path = child_path(DATES_KEY, &date);
        let mut group = DateGroup::new(date.clone());

        for plot in children(backend, &date_path)? {
            let plot_path = child_path(&date_path, &plot);
            let mut plot_group = PlotGroup::new(plot.clone());
            for band in children(backend, &plot_path)? {
                let array = backend.read_f32_array(&child_path(&plot_path, &band))?;
                plot_group
                    .insert_band(band, array)
                    .map_err(|e| StoreError::format(&plot_path, e.to_string()))?;
            }
            group
                .insert_plot(plot_group)
                .map_err(|e| StoreError::format(&date_path, e.to_string()))?;
        }

        tree.insert_date(group)
            .map_err(|e| StoreError::format(DATES_KEY, e.to_string()))?;
    }
    Ok(tree)
}

fn load_table<B: StoreBackend + ?Sized>(backend: &B) -> StoreResult<PlotTable> {
    let attrs = backend.group_attributes(LDATA_KEY)?;
    let n_rows = attrs
        .get(N_ROWS_ATTR)
        .and_then(Value::as_u64)
        .ok_or_else(|| StoreError::MissingKey(format!("{}@{}", LDATA_KEY, N_ROWS_ATTR)))?
        as usize;
    let entries: Vec<ColumnEntry> = attrs
        .get(COLUMNS_ATTR)
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| StoreError::format(LDATA_KEY, e.to_string()))?
        .ok_or_else(|| StoreError::MissingKey(format!("{}@{}", LDATA_KEY, COLUMNS_ATTR)))?;

    let mut columns = Vec::with_capacity(entries.len());
    for entry in entries {
        let column = match entry {
            ColumnEntry::Number { name, array } => {
                let values = backend.read_f64_array(&child_path(LDATA_KEY, &array))?;
                Column::numbers(name, values)
            }
            ColumnEntry::Text {
                name,
                array,
                lengths,
            } => {
                let bytes = backend.read_u8_array(&child_path(LDATA_KEY, &array))?;
                let sizes = backend.read_i64_array(&child_path(LDATA_KEY, &lengths))?;
                let values = decode_text(&bytes, &sizes).map_err(|message| {
                    StoreError::format(LDATA_KEY, format!("column '{}': {}", name, message))
                })?;
                Column::text(name, values)
            }
        };
        if column.len() != n_rows {
            return Err(StoreError::format(
                LDATA_KEY,
                format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    n_rows
                ),
            ));
        }
        columns.push(column);
    }

    PlotTable::from_columns(columns).map_err(|e| StoreError::format(LDATA_KEY, e.to_string()))
}

/// Concatenated UTF-8 bytes plus one byte length per cell, -1 for missing.
fn encode_text(values: &[Option<String>]) -> (Vec<u8>, Vec<i64>) {
    let mut bytes = Vec::new();
    let mut sizes = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Some(text) => {
                bytes.extend_from_slice(text.as_bytes());
                sizes.push(text.len() as i64);
            }
            None => sizes.push(-1),
        }
    }
    (bytes, sizes)
}

fn decode_text(bytes: &[u8], sizes: &[i64]) -> Result<Vec<Option<String>>, String> {
    let mut offset = 0usize;
    let mut values = Vec::with_capacity(sizes.len());
    for &size in sizes {
        if size == -1 {
            values.push(None);
            continue;
        }
        let end = usize::try_from(size)
            .ok()
            .and_then(|n| offset.checked_add(n))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| format!("invalid cell length {} at byte {}", size, offset))?;
        let text = std::str::from_utf8(&bytes[offset..end]).map_err(|e| e.to_string())?;
        values.push(Some(text.to_string()));
        offset = end;
    }
    if offset != bytes.len() {
        return Err(format!("{} trailing bytes", bytes.len() - offset));
    }
    Ok(values)
}
