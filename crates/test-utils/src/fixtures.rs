//! Common test fixtures: a synthetic field of rectangular plots written as
//! GeoTIFF orthomosaics and a GeoJSON grid.
//!
//! Plots are aligned with the pixel grid and every plot carries a constant
//! value per band, so extracted band means are known exactly.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// EPSG code written into fixtures (UTM zone 11N).
pub const FIXTURE_EPSG: u16 = 32611;

/// Result type for fixture writers.
pub type FixtureResult<T> = Result<T, Box<dyn std::error::Error>>;

/// One rectangular plot in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSpec {
    pub id: String,
    pub col0: usize,
    pub row0: usize,
    pub cols: usize,
    pub rows: usize,
    /// Value of each true band (red, green, blue) inside the plot.
    pub values: [u8; 3],
    /// Extra GeoJSON property written for the plot, if any.
    pub genotype: Option<String>,
}

/// Raster geometry and the plots it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub width: usize,
    pub height: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    /// Value of every true band outside the plots.
    pub background: u8,
    pub plots: Vec<PlotSpec>,
}

impl Default for FieldLayout {
    /// A 60×40 raster at 1 m resolution with two tall plots, A1 and A2.
    fn default() -> Self {
        Self {
            width: 60,
            height: 40,
            origin_x: 500_000.0,
            origin_y: 4_100_040.0,
            pixel_size: 1.0,
            background: 30,
            plots: vec![
                PlotSpec {
                    id: "A1".to_string(),
                    col0: 5,
                    row0: 8,
                    cols: 12,
                    rows: 24,
                    values: [120, 80, 40],
                    genotype: None,
                },
                PlotSpec {
                    id: "A2".to_string(),
                    col0: 30,
                    row0: 8,
                    cols: 12,
                    rows: 24,
                    values: [200, 160, 60],
                    genotype: None,
                },
            ],
        }
    }
}

impl FieldLayout {
    /// Same geometry with a genotype attribute on every plot.
    pub fn with_genotypes(mut self, genotypes: &[&str]) -> Self {
        for (plot, genotype) in self.plots.iter_mut().zip(genotypes) {
            plot.genotype = Some(genotype.to_string());
        }
        self
    }

    /// Same geometry with every plot value transformed by `f`.
    pub fn map_values(&self, f: impl Fn(u8) -> u8) -> Self {
        let mut layout = self.clone();
        for plot in &mut layout.plots {
            plot.values = plot.values.map(&f);
        }
        layout
    }

    /// Value of true band `band` at a pixel.
    pub fn band_value(&self, band: usize, col: usize, row: usize) -> u8 {
        self.plots
            .iter()
            .find(|p| col >= p.col0 && col < p.col0 + p.cols && row >= p.row0 && row < p.row0 + p.rows)
            .map_or(self.background, |p| p.values[band])
    }

    /// Map-coordinate ring of a plot, closed, counter-clockwise.
    pub fn plot_ring(&self, plot: &PlotSpec) -> Vec<[f64; 2]> {
        let x0 = self.origin_x + plot.col0 as f64 * self.pixel_size;
        let x1 = self.origin_x + (plot.col0 + plot.cols) as f64 * self.pixel_size;
        let y0 = self.origin_y - (plot.row0 + plot.rows) as f64 * self.pixel_size;
        let y1 = self.origin_y - plot.row0 as f64 * self.pixel_size;
        vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]
    }

    fn pixels(&self, with_alpha: bool) -> Vec<u8> {
        let samples = if with_alpha { 4 } else { 3 };
        let mut data = Vec::with_capacity(self.width * self.height * samples);
        for row in 0..self.height {
            for col in 0..self.width {
                for band in 0..3 {
                    data.push(self.band_value(band, col, row));
                }
                if with_alpha {
                    data.push(255);
                }
            }
        }
        data
    }

    fn geokeys() -> Vec<u16> {
        vec![
            1, 1, 0, 3, // version 1.1.0, 3 keys
            1024, 0, 1, 1, // GTModelTypeGeoKey = projected
            1025, 0, 1, 1, // GTRasterTypeGeoKey = pixel is area
            3072, 0, 1, FIXTURE_EPSG, // ProjectedCSTypeGeoKey
        ]
    }
}

/// Write an RGBA orthomosaic whose alpha channel is declared via ExtraSamples.
pub fn write_rgba_geotiff(path: impl AsRef<Path>, layout: &FieldLayout) -> FixtureResult<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path.as_ref())?))?;
    let mut image =
        encoder.new_image::<colortype::RGBA8>(layout.width as u32, layout.height as u32)?;
    write_geotags(image.encoder(), layout)?;
    image.encoder().write_tag(Tag::ExtraSamples, &[2u16][..])?;
    image.write_data(&layout.pixels(true))?;
    Ok(())
}

/// Write an RGB orthomosaic without any alpha channel.
pub fn write_rgb_geotiff(path: impl AsRef<Path>, layout: &FieldLayout) -> FixtureResult<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path.as_ref())?))?;
    let mut image =
        encoder.new_image::<colortype::RGB8>(layout.width as u32, layout.height as u32)?;
    write_geotags(image.encoder(), layout)?;
    image.write_data(&layout.pixels(false))?;
    Ok(())
}

/// Write a plain TIFF with no georeferencing tags.
pub fn write_plain_tiff(path: impl AsRef<Path>, layout: &FieldLayout) -> FixtureResult<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path.as_ref())?))?;
    encoder.write_image::<colortype::RGB8>(
        layout.width as u32,
        layout.height as u32,
        &layout.pixels(false),
    )?;
    Ok(())
}

fn write_geotags<W, K>(
    dir: &mut tiff::encoder::DirectoryEncoder<'_, W, K>,
    layout: &FieldLayout,
) -> FixtureResult<()>
where
    W: std::io::Write + std::io::Seek,
    K: tiff::encoder::TiffKind,
{
    let scale = [layout.pixel_size, layout.pixel_size, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, layout.origin_x, layout.origin_y, 0.0];
    dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
    dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    dir.write_tag(Tag::GeoKeyDirectoryTag, &FieldLayout::geokeys()[..])?;
    Ok(())
}

/// GeoJSON FeatureCollection describing the layout's plots.
pub fn grid_geojson(layout: &FieldLayout, id_column: &str) -> Value {
    let features: Vec<Value> = layout
        .plots
        .iter()
        .map(|plot| {
            let mut properties = Map::new();
            properties.insert(id_column.to_string(), json!(plot.id));
            if let Some(genotype) = &plot.genotype {
                properties.insert("genotype".to_string(), json!(genotype));
            }
            json!({
                "type": "Feature",
                "properties": properties,
                "geometry": { "type": "Polygon", "coordinates": [layout.plot_ring(plot)] }
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "crs": {
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", FIXTURE_EPSG) }
        },
        "features": features
    })
}

/// Write the layout's plot grid as GeoJSON.
pub fn write_grid_geojson(
    path: impl AsRef<Path>,
    layout: &FieldLayout,
    id_column: &str,
) -> FixtureResult<()> {
    let mut file = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut file, &grid_geojson(layout, id_column))?;
    file.flush()?;
    Ok(())
}

/// A scratch directory holding a grid file and a `rasters/` folder.
pub struct FieldScene {
    pub dir: tempfile::TempDir,
    pub layout: FieldLayout,
}

impl FieldScene {
    /// Create the scene with `grid.geojson` written for `id_column`.
    pub fn new(layout: FieldLayout, id_column: &str) -> FixtureResult<Self> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("rasters"))?;
        write_grid_geojson(dir.path().join("grid.geojson"), &layout, id_column)?;
        Ok(Self { dir, layout })
    }

    pub fn grid_path(&self) -> PathBuf {
        self.dir.path().join("grid.geojson")
    }

    pub fn raster_dir(&self) -> PathBuf {
        self.dir.path().join("rasters")
    }

    /// Write `<date>_ortho.tif` (RGBA) with plot values transformed by `f`.
    pub fn add_flight(&self, date: &str, f: impl Fn(u8) -> u8) -> FixtureResult<PathBuf> {
        let path = self.raster_dir().join(format!("{}_ortho.tif", date));
        write_rgba_geotiff(&path, &self.layout.map_values(f))?;
        Ok(path)
    }
}
