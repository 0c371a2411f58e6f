//! Auto-fit alignment of plot masks.
//!
//! A plot photographed at an arbitrary yaw is straightened by rotating its
//! footprint so the minimum-area rectangle becomes upright, then cropped
//! tightly inside the rotated footprint. The resulting [`Alignment`] is
//! applied unchanged to every band of the plot.

use geo::{Coord, LineString, MinimumRotatedRect, MultiPoint, Point};
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::contrast::{otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;
use ndarray::{s, Array2};
use thiserror::Error;
use tracing::trace;

use crate::config::ExtractionConfig;
use crate::rotate::rotate_expand;

/// Angles closer than this (degrees) to an axis are snapped onto it.
const ANGLE_EPSILON: f64 = 1e-6;

/// Why a mask could not be aligned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentFailure {
    #[error("mask has no foreground contour")]
    NoContour,

    #[error("contour area {area:.1} px² is below the minimum of {min:.1} px²")]
    ContourTooSmall { area: f64, min: f64 },

    #[error("minimum bounding rectangle is degenerate")]
    DegenerateRectangle,

    #[error("rotated mask has no foreground")]
    EmptyForeground,

    #[error("crop buffer of {buffer} px leaves nothing of a {rows}x{cols} footprint")]
    BufferTooLarge {
        buffer: usize,
        rows: usize,
        cols: usize,
    },

    #[error("band shape {actual:?} does not match the aligned mask shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Crop box in the rotated frame, half-open: rows `y1..y2`, cols `x1..x2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub y1: usize,
    pub y2: usize,
    pub x1: usize,
    pub x2: usize,
}

impl CropBox {
    pub fn rows(&self) -> usize {
        self.y2 - self.y1
    }

    pub fn cols(&self) -> usize {
        self.x2 - self.x1
    }
}

/// Rotation and crop derived from one plot mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    /// Counter-clockwise rotation in degrees.
    pub angle: f64,
    pub crop: CropBox,
    /// `(rows, cols)` of the mask the alignment was derived from.
    pub source_shape: (usize, usize),
}

impl Alignment {
    /// Rotate and crop one band exactly as the mask was.
    pub fn apply(&self, band: &Array2<f32>) -> Result<Array2<f32>, AlignmentFailure> {
        if band.dim() != self.source_shape {
            return Err(AlignmentFailure::ShapeMismatch {
                expected: self.source_shape,
                actual: band.dim(),
            });
        }
        let rotated = rotate_expand(band, self.angle);
        let c = self.crop;
        Ok(rotated.slice(s![c.y1..c.y2, c.x1..c.x2]).to_owned())
    }
}

/// Derive the rotation angle and crop box for a plot mask.
pub fn auto_fit(mask: &Array2<f32>, config: &ExtractionConfig) -> Result<Alignment, AlignmentFailure> {
    let binary = mask.mapv(|v| if v > 0.0 { 255.0 } else { 0.0 });

    let contour = last_contour(&binary).ok_or(AlignmentFailure::NoContour)?;
    let area = shoelace_area(&contour);
    if area < config.min_contour_area || area == 0.0 {
        return Err(AlignmentFailure::ContourTooSmall {
            area,
            min: config.min_contour_area,
        });
    }

    let (rect_angle, width, height) = min_area_rect(&contour)?;
    let angle = if width < height {
        rect_angle
    } else {
        rect_angle + 90.0
    };

    let rotated = rotate_expand(&binary, angle);
    let crop = foreground_crop(&rotated, config)?;
    trace!(angle, ?crop, "Fitted plot mask");

    Ok(Alignment {
        angle,
        crop,
        source_shape: mask.dim(),
    })
}

fn to_gray(values: &Array2<f32>, pad: u32) -> GrayImage {
    let (rows, cols) = values.dim();
    GrayImage::from_fn(cols as u32 + 2 * pad, rows as u32 + 2 * pad, |x, y| {
        let (c, r) = (x as i64 - pad as i64, y as i64 - pad as i64);
        if c < 0 || r < 0 || c as usize >= cols || r as usize >= rows {
            Luma([0])
        } else {
            Luma([values[[r as usize, c as usize]].round().clamp(0.0, 255.0) as u8])
        }
    })
}

/// Points of the last contour found, in array (col, row) coordinates.
fn last_contour(binary: &Array2<f32>) -> Option<Vec<Coord<f64>>> {
    // Contour tracing runs on a zero border so footprints touching the
    // window edge still close.
    let image = to_gray(binary, 1);
    let contour = find_contours::<i32>(&image).pop()?;
    let points: Vec<Coord<f64>> = contour
        .points
        .iter()
        .map(|p| Coord {
            x: (p.x - 1) as f64,
            y: (p.y - 1) as f64,
        })
        .collect();
    (!points.is_empty()).then_some(points)
}

fn shoelace_area(points: &[Coord<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() / 2.0
}

/// Angle (degrees), width and height of the minimum-area rectangle.
///
/// The angle is the pixel-frame direction (y down) of the rectangle edge
/// whose orientation lies in [0°, 90°); the width is that edge's length.
fn min_area_rect(points: &[Coord<f64>]) -> Result<(f64, f64, f64), AlignmentFailure> {
    let cloud: MultiPoint<f64> = points.iter().map(|c| Point::from(*c)).collect();
    let rect = cloud
        .minimum_rotated_rect()
        .ok_or(AlignmentFailure::DegenerateRectangle)?;

    let edges = edge_vectors(rect.exterior());
    let index = edges
        .iter()
        .position(|(dx, dy)| {
            dx.hypot(*dy) > ANGLE_EPSILON
                && normalize_orientation(dy.atan2(*dx).to_degrees()) < 90.0
        })
        .ok_or(AlignmentFailure::DegenerateRectangle)?;

    let (dx, dy) = edges[index];
    let (hx, hy) = edges[(index + 1) % edges.len()];
    let width = dx.hypot(dy);
    let height = hx.hypot(hy);
    if height <= ANGLE_EPSILON {
        return Err(AlignmentFailure::DegenerateRectangle);
    }

    let angle = normalize_orientation(dy.atan2(dx).to_degrees());
    Ok((angle, width, height))
}

fn edge_vectors(ring: &LineString<f64>) -> Vec<(f64, f64)> {
    ring.lines()
        .map(|l| (l.end.x - l.start.x, l.end.y - l.start.y))
        .collect()
}

/// Map an edge direction onto [0°, 180°), snapping values next to 0° and
/// 90° onto the axis.
fn normalize_orientation(degrees: f64) -> f64 {
    let a = degrees.rem_euclid(180.0);
    if a < ANGLE_EPSILON || 180.0 - a < ANGLE_EPSILON {
        0.0
    } else if (a - 90.0).abs() < ANGLE_EPSILON {
        90.0
    } else {
        a
    }
}

/// Re-binarise the rotated mask and shrink its bounding box by the buffer.
fn foreground_crop(
    rotated: &Array2<f32>,
    config: &ExtractionConfig,
) -> Result<CropBox, AlignmentFailure> {
    let gray = to_gray(rotated, 0);
    let blurred = if config.blur_sigma > 0.0 {
        gaussian_blur_f32(&gray, config.blur_sigma)
    } else {
        gray
    };
    // A uniform image yields the top level; keep full-white footprints.
    let level = otsu_level(&blurred).min(u8::MAX - 1);
    let binary = threshold(&blurred, level);

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in binary.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (y, y, x, x),
            Some((y0, y1, x0, x1)) => (y0.min(y), y1.max(y), x0.min(x), x1.max(x)),
        });
    }
    let (y_min, y_max, x_min, x_max) = bounds.ok_or(AlignmentFailure::EmptyForeground)?;

    let buffer = config.crop_buffer;
    let (rows, cols) = ((y_max - y_min + 1) as usize, (x_max - x_min + 1) as usize);
    if rows <= 2 * buffer || cols <= 2 * buffer {
        return Err(AlignmentFailure::BufferTooLarge { buffer, rows, cols });
    }

    Ok(CropBox {
        y1: y_min as usize + buffer,
        y2: y_max as usize + 1 - buffer,
        x1: x_min as usize + buffer,
        x2: x_max as usize + 1 - buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{rect_mask, rotated_rect_mask};

    #[test]
    fn test_upright_plot_needs_no_rotation() {
        let mask = rect_mask(20, 40, 4, 5, 10, 30, 255.0);
        let alignment = auto_fit(&mask, &ExtractionConfig::default()).unwrap();
        assert_eq!(alignment.angle, 0.0);
        // Footprint rows 5..35, cols 4..14, shrunk by 2 px.
        assert_eq!(
            alignment.crop,
            CropBox { y1: 7, y2: 33, x1: 6, x2: 12 }
        );
    }

    #[test]
    fn test_wide_plot_turned_upright() {
        let mask = rect_mask(40, 20, 5, 4, 30, 10, 255.0);
        let alignment = auto_fit(&mask, &ExtractionConfig::default()).unwrap();
        assert_eq!(alignment.angle, 90.0);
        assert!(alignment.crop.rows() > alignment.crop.cols());
    }

    #[test]
    fn test_full_window_footprint() {
        let mask = Array2::from_elem((24, 12), 255.0f32);
        let alignment = auto_fit(&mask, &ExtractionConfig::default()).unwrap();
        assert_eq!(alignment.angle, 0.0);
        assert_eq!(alignment.crop, CropBox { y1: 2, y2: 22, x1: 2, x2: 10 });
    }

    #[test]
    fn test_rotated_plot_is_straightened() {
        let mask = rotated_rect_mask(60, 60, 30.0, 30.0, 36.0, 12.0, 30.0);
        let alignment = auto_fit(&mask, &ExtractionConfig::default()).unwrap();
        assert!(
            (alignment.angle - 60.0).abs() < 4.0,
            "angle {}",
            alignment.angle
        );

        let aligned = alignment.apply(&mask).unwrap();
        assert!(aligned.nrows() > aligned.ncols());
        let filled = aligned.iter().filter(|v| **v > 127.0).count() as f64;
        assert!(filled / aligned.len() as f64 > 0.8);
    }

    #[test]
    fn test_alignment_is_deterministic() {
        let mask = rotated_rect_mask(50, 50, 25.0, 25.0, 30.0, 10.0, 17.0);
        let config = ExtractionConfig::default();
        let first = auto_fit(&mask, &config).unwrap();
        let second = auto_fit(&mask, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_mask_has_no_contour() {
        let mask = Array2::zeros((10, 10));
        assert_eq!(
            auto_fit(&mask, &ExtractionConfig::default()),
            Err(AlignmentFailure::NoContour)
        );
    }

    #[test]
    fn test_tiny_contour_rejected() {
        let mask = rect_mask(10, 10, 4, 4, 2, 2, 255.0);
        let err = auto_fit(&mask, &ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, AlignmentFailure::ContourTooSmall { .. }));
    }

    #[test]
    fn test_buffer_larger_than_footprint() {
        let mask = rect_mask(20, 20, 5, 2, 4, 16, 255.0);
        let config = ExtractionConfig {
            crop_buffer: 2,
            ..ExtractionConfig::default()
        };
        let err = auto_fit(&mask, &config).unwrap_err();
        assert!(matches!(err, AlignmentFailure::BufferTooLarge { .. }));
    }

    #[test]
    fn test_apply_rejects_other_shapes() {
        let mask = rect_mask(20, 40, 4, 5, 10, 30, 255.0);
        let alignment = auto_fit(&mask, &ExtractionConfig::default()).unwrap();
        let err = alignment.apply(&Array2::zeros((5, 5))).unwrap_err();
        assert!(matches!(err, AlignmentFailure::ShapeMismatch { .. }));
    }

    #[test]
    fn test_normalize_orientation_snaps_axes() {
        assert_eq!(normalize_orientation(-1e-12), 0.0);
        assert_eq!(normalize_orientation(180.0), 0.0);
        assert_eq!(normalize_orientation(90.0 + 1e-9), 90.0);
        assert_eq!(normalize_orientation(-30.0), 150.0);
    }

    #[test]
    fn test_zero_sigma_skips_blur() {
        let mask = rect_mask(20, 40, 4, 5, 10, 30, 255.0);
        let config = ExtractionConfig {
            blur_sigma: 0.0,
            ..ExtractionConfig::default()
        };
        assert!(config.validate().is_ok());
        let alignment = auto_fit(&mask, &config).unwrap();
        // No blur: the crop is the exact footprint shrunk by the buffer.
        assert_eq!(
            alignment.crop,
            CropBox { y1: 7, y2: 33, x1: 6, x2: 12 }
        );
    }
}
