//! Raster masking: clip a raster to one plot polygon.

use geo::{Contains, Point};
use geotiff_reader::Raster;
use ndarray::{s, Array2};
use plot_common::{PlotError, PlotResult};

use crate::grid::PlotPolygon;

/// Pixel window of a raster, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col0: usize,
    pub row0: usize,
    pub cols: usize,
    pub rows: usize,
}

/// Bands of one plot, clipped to its polygon.
#[derive(Debug, Clone)]
pub struct MaskedPlot {
    /// True bands in raster order; pixels outside the polygon are 0.
    pub bands: Vec<Array2<f32>>,
    /// Footprint source: the alpha band, or the last band when there is none.
    pub mask: Array2<f32>,
    pub window: PixelWindow,
}

/// Pixel window covering the polygon's extent, clipped to the raster.
pub fn plot_window(raster: &Raster, plot: &PlotPolygon) -> Option<PixelWindow> {
    let bbox = raster.bounds().intersection(&plot.bbox()?)?;
    let (c_a, r_a) = raster.transform.to_pixel(bbox.min_x, bbox.max_y);
    let (c_b, r_b) = raster.transform.to_pixel(bbox.max_x, bbox.min_y);
    if ![c_a, r_a, c_b, r_b].iter().all(|v| v.is_finite()) {
        return None;
    }

    // Round outward; the clamp only absorbs float noise at the raster edge.
    let col0 = c_a.min(c_b).floor().max(0.0);
    let row0 = r_a.min(r_b).floor().max(0.0);
    let col1 = c_a.max(c_b).ceil().min(raster.width as f64);
    let row1 = r_a.max(r_b).ceil().min(raster.height as f64);
    if col1 <= col0 || row1 <= row0 {
        return None;
    }

    Some(PixelWindow {
        col0: col0 as usize,
        row0: row0 as usize,
        cols: (col1 - col0) as usize,
        rows: (row1 - row0) as usize,
    })
}

/// Clip `raster` to `plot`.
///
/// The window is the polygon's bounding box; inside it, pixels whose centre
/// falls outside the polygon are zeroed in every band and in the mask.
pub fn mask_plot(raster: &Raster, plot: &PlotPolygon, file: &str) -> PlotResult<MaskedPlot> {
    let mask_index = raster
        .mask_band_index()
        .ok_or_else(|| PlotError::raster(file, "raster has no bands"))?;
    let window = plot_window(raster, plot).ok_or_else(|| {
        PlotError::extraction(&plot.id, file, "plot polygon does not overlap the raster")
    })?;

    let inside = Array2::from_shape_fn((window.rows, window.cols), |(r, c)| {
        let (x, y) = raster
            .transform
            .pixel_center(window.col0 + c, window.row0 + r);
        plot.geometry.contains(&Point::new(x, y))
    });
    if !inside.iter().any(|v| *v) {
        return Err(PlotError::extraction(
            &plot.id,
            file,
            "no pixel centre falls inside the plot polygon",
        ));
    }

    let clip = |band: &Array2<f32>| {
        let mut out = band
            .slice(s![
                window.row0..window.row0 + window.rows,
                window.col0..window.col0 + window.cols
            ])
            .to_owned();
        out.zip_mut_with(&inside, |v, keep| {
            if !keep {
                *v = 0.0;
            }
        });
        out
    };

    Ok(MaskedPlot {
        bands: raster
            .true_band_indices()
            .into_iter()
            .map(|i| clip(&raster.bands[i]))
            .collect(),
        mask: clip(&raster.bands[mask_index]),
        window,
    })
}
