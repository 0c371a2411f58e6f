//! Plot grid reading.
//!
//! A grid is a GeoJSON FeatureCollection with one (Multi)Polygon feature per
//! plot. One property identifies the plot; every other property becomes an
//! attribute column that is later joined onto the summary table.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::{BoundingRect, Coord, LineString, MultiPolygon, Polygon};
use plot_common::{BoundingBox, Column, PlotError, PlotResult, PlotTable, ID_COLUMN};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Grid file extensions understood by [`read_grid`].
pub const GRID_EXTENSIONS: &[&str] = &["geojson", "json"];

/// One plot of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotPolygon {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
}

impl PlotPolygon {
    /// Map extent of the plot, `None` for an empty geometry.
    pub fn bbox(&self) -> Option<BoundingBox> {
        let rect = self.geometry.bounding_rect()?;
        Some(BoundingBox::new(
            rect.min().x,
            rect.min().y,
            rect.max().x,
            rect.max().y,
        ))
    }
}

/// Parsed plot grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotGrid {
    /// CRS declared by the file, passed through untouched.
    pub crs: Option<String>,
    /// Plots in file order.
    pub plots: Vec<PlotPolygon>,
    /// `id` plus one column per extra feature property.
    pub attributes: Option<PlotTable>,
}

impl PlotGrid {
    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    pub fn plot(&self, id: &str) -> Option<&PlotPolygon> {
        self.plots.iter().find(|p| p.id == id)
    }
}

// ============================================================================
// GeoJSON model
// ============================================================================

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    crs: Option<NamedCrs>,
    features: Vec<Feature>,
}

/// Legacy `{"type": "name", "properties": {"name": ...}}` CRS member.
#[derive(Debug, Deserialize)]
struct NamedCrs {
    properties: CrsProperties,
}

#[derive(Debug, Deserialize)]
struct CrsProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<GridGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GridGeometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
}

/// Read a plot grid, identifying plots by the `id_column` property.
pub fn read_grid(path: impl AsRef<Path>, id_column: &str) -> PlotResult<PlotGrid> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !GRID_EXTENSIONS.contains(&extension.as_str()) {
        return Err(PlotError::Format(format!(
            "'{}' is not a GeoJSON grid (expected .geojson or .json)",
            path.display()
        )));
    }

    let collection: FeatureCollection =
        serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let grid = build_grid(collection, id_column)?;

    info!(
        path = %path.display(),
        plots = grid.len(),
        crs = grid.crs.as_deref().unwrap_or("unknown"),
        "Read plot grid"
    );
    Ok(grid)
}

/// Parse a grid from a GeoJSON string.
pub fn parse_grid(json: &str, id_column: &str) -> PlotResult<PlotGrid> {
    build_grid(serde_json::from_str(json)?, id_column)
}

fn build_grid(collection: FeatureCollection, id_column: &str) -> PlotResult<PlotGrid> {
    let mut plots: Vec<PlotPolygon> = Vec::with_capacity(collection.features.len());
    let mut properties: Vec<Map<String, Value>> = Vec::with_capacity(collection.features.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let mut props = feature.properties.unwrap_or_default();
        let id = props
            .remove(id_column)
            .and_then(|v| render_id(&v))
            .ok_or_else(|| {
                PlotError::Format(format!(
                    "feature {} has no usable '{}' property",
                    index, id_column
                ))
            })?;
        let geometry = feature
            .geometry
            .ok_or_else(|| PlotError::Format(format!("plot '{}' has no geometry", id)))
            .and_then(|g| to_multipolygon(g, &id))?;

        let plot = PlotPolygon {
            id: id.clone(),
            geometry,
        };
        match positions.get(&id) {
            Some(&pos) => {
                debug!(plot = %id, "Duplicate plot id, later feature wins");
                plots[pos] = plot;
                properties[pos] = props;
            }
            None => {
                positions.insert(id, plots.len());
                plots.push(plot);
                properties.push(props);
            }
        }
    }

    let attributes = attribute_table(&plots, &properties)?;
    Ok(PlotGrid {
        crs: collection.crs.map(|c| c.properties.name),
        plots,
        attributes,
    })
}

/// Plot ids may be strings or numbers; integral numbers drop the fraction.
fn render_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        _ => None,
    }
}

fn to_ring(positions: Vec<Vec<f64>>, id: &str) -> PlotResult<LineString<f64>> {
    positions
        .into_iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(PlotError::Format(format!(
                "plot '{}' has a position with fewer than two ordinates",
                id
            ))),
        })
        .collect::<PlotResult<Vec<_>>>()
        .map(LineString::new)
}

fn to_polygon(rings: Vec<Vec<Vec<f64>>>, id: &str) -> PlotResult<Polygon<f64>> {
    let mut rings = rings.into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| PlotError::Format(format!("plot '{}' has an empty polygon", id)))?;
    let interiors = rings
        .map(|r| to_ring(r, id))
        .collect::<PlotResult<Vec<_>>>()?;
    Ok(Polygon::new(to_ring(exterior, id)?, interiors))
}

fn to_multipolygon(geometry: GridGeometry, id: &str) -> PlotResult<MultiPolygon<f64>> {
    let polygons = match geometry {
        GridGeometry::Polygon { coordinates } => vec![to_polygon(coordinates, id)?],
        GridGeometry::MultiPolygon { coordinates } => coordinates
            .into_iter()
            .map(|p| to_polygon(p, id))
            .collect::<PlotResult<Vec<_>>>()?,
    };
    Ok(MultiPolygon::new(polygons))
}

/// Collect the remaining feature properties into a table keyed by `id`.
///
/// A property named `id` other than the id property itself is dropped.
/// A property whose non-null values are all numbers becomes a numeric
/// column; anything else is stored as text.
fn attribute_table(
    plots: &[PlotPolygon],
    properties: &[Map<String, Value>],
) -> PlotResult<Option<PlotTable>> {
    let mut names: Vec<&str> = Vec::new();
    for props in properties {
        for key in props.keys() {
            if key != ID_COLUMN && !names.contains(&key.as_str()) {
                names.push(key);
            }
        }
    }
    let shadowed = properties.iter().filter(|p| p.contains_key(ID_COLUMN)).count();
    if shadowed > 0 {
        debug!(
            features = shadowed,
            "Property '{}' is not the plot id column and is dropped", ID_COLUMN
        );
    }
    if names.is_empty() {
        return Ok(None);
    }

    let mut columns = vec![Column::text(
        ID_COLUMN,
        plots.iter().map(|p| Some(p.id.clone())).collect(),
    )];
    for name in names {
        let values: Vec<Option<&Value>> = properties
            .iter()
            .map(|props| props.get(name).filter(|v| !v.is_null()))
            .collect();
        let numeric = values.iter().flatten().all(|v| v.is_number());
        let column = if numeric {
            Column::numbers(
                name,
                values
                    .iter()
                    .map(|v| v.and_then(Value::as_f64).unwrap_or(f64::NAN))
                    .collect(),
            )
        } else {
            Column::text(
                name,
                values
                    .iter()
                    .map(|v| {
                        v.map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                    })
                    .collect(),
            )
        };
        columns.push(column);
    }
    PlotTable::from_columns(columns).map(Some)
}
