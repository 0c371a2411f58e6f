//! Affine georeferencing for rasters.

use plot_common::BoundingBox;

/// Affine transformation between pixel (col, row) and map (x, y) coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// North-up rasters have a negative `pixel_height`. Rotated transforms are
/// not produced by the tag combination this reader understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width in map units
    pub pixel_width: f64,
    /// Pixel height in map units (usually negative)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Pixel coordinates used as map coordinates, rows increasing downward.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Build from ModelPixelScale `[sx, sy, sz]` and ModelTiepoint
    /// `[i, j, k, x, y, z]` tag values.
    pub fn from_tags(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 || scale[0] == 0.0 || scale[1] == 0.0 {
            return None;
        }
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        Some(Self::new(origin_x, origin_y, scale[0], -scale[1]))
    }

    /// Map coordinates of a pixel centre.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates (col, row) of a map position.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Map extent covered by a `width` × `height` raster.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let x1 = self.origin_x + width as f64 * self.pixel_width;
        let y1 = self.origin_y + height as f64 * self.pixel_height;
        BoundingBox::new(
            self.origin_x.min(x1),
            self.origin_y.min(y1),
            self.origin_x.max(x1),
            self.origin_y.max(y1),
        )
    }
}
