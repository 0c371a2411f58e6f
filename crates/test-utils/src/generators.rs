//! Generators for synthetic plot masks.
//!
//! These generators create predictable, verifiable footprints that the
//! alignment tests can reason about exactly.

use ndarray::Array2;

/// Creates a mask with a filled, axis-aligned rectangle.
///
/// Pixels with `row0 <= row < row0 + rows` and `col0 <= col < col0 + cols`
/// are set to `value`; everything else is 0.
///
/// # Example
///
/// ```
/// use test_utils::rect_mask;
///
/// let mask = rect_mask(10, 8, 2, 1, 4, 3, 255.0);
/// assert_eq!(mask.dim(), (8, 10));
/// assert_eq!(mask[[1, 2]], 255.0);
/// assert_eq!(mask[[0, 0]], 0.0);
/// assert_eq!(mask.iter().filter(|v| **v > 0.0).count(), 12);
/// ```
pub fn rect_mask(
    width: usize,
    height: usize,
    col0: usize,
    row0: usize,
    cols: usize,
    rows: usize,
    value: f32,
) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(r, c)| {
        if r >= row0 && r < row0 + rows && c >= col0 && c < col0 + cols {
            value
        } else {
            0.0
        }
    })
}

/// Creates a mask with a filled rectangle rotated about its centre.
///
/// The rectangle is `rect_w` pixels along its long axis before rotation and
/// `rect_h` across, centred at (`cx`, `cy`) in pixel coordinates, turned by
/// `angle_deg` counter-clockwise as displayed (rows increase downward).
/// A pixel is foreground when its centre falls inside the rectangle.
pub fn rotated_rect_mask(
    width: usize,
    height: usize,
    cx: f64,
    cy: f64,
    rect_w: f64,
    rect_h: f64,
    angle_deg: f64,
) -> Array2<f32> {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    Array2::from_shape_fn((height, width), |(r, c)| {
        let dx = c as f64 + 0.5 - cx;
        let dy = r as f64 + 0.5 - cy;
        // Undo a counter-clockwise turn in a y-down frame.
        let u = dx * cos - dy * sin;
        let v = dx * sin + dy * cos;
        if u.abs() <= rect_w / 2.0 && v.abs() <= rect_h / 2.0 {
            255.0
        } else {
            0.0
        }
    })
}

/// Creates a band with a horizontal gradient: `value = base + col * step`.
pub fn gradient_band(width: usize, height: usize, base: f32, step: f32) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(_, c)| base + c as f32 * step)
}
