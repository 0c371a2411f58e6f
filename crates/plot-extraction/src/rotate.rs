//! Canvas-expanding rotation of band arrays.
//!
//! Angles are in degrees, counter-clockwise as displayed (rows grow
//! downward). The output canvas is enlarged so no source pixel is clipped,
//! and both images share the same centre.

use ndarray::Array2;

/// Output `(rows, cols)` of rotating a `rows × cols` array by `angle_deg`.
pub fn rotated_shape(rows: usize, cols: usize, angle_deg: f64) -> (usize, usize) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let (w, h) = (cols as f64, rows as f64);
    let out_cols = (w * cos.abs() + h * sin.abs() + 0.5).floor() as usize;
    let out_rows = (w * sin.abs() + h * cos.abs() + 0.5).floor() as usize;
    (out_rows, out_cols)
}

/// Rotate `src` by `angle_deg`, expanding the canvas; samples falling
/// outside the source read as 0.
pub fn rotate_expand(src: &Array2<f32>, angle_deg: f64) -> Array2<f32> {
    let (rows, cols) = src.dim();
    let (out_rows, out_cols) = rotated_shape(rows, cols, angle_deg);
    let (sin, cos) = angle_deg.to_radians().sin_cos();

    let src_cx = (cols as f64 - 1.0) / 2.0;
    let src_cy = (rows as f64 - 1.0) / 2.0;
    let out_cx = (out_cols as f64 - 1.0) / 2.0;
    let out_cy = (out_rows as f64 - 1.0) / 2.0;

    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let dx = c as f64 - out_cx;
        let dy = r as f64 - out_cy;
        // Inverse mapping: turn the output offset back clockwise.
        let x = src_cx + dx * cos - dy * sin;
        let y = src_cy + dx * sin + dy * cos;
        bilinear_sample(src, x, y)
    })
}

/// Bilinear interpolation with zero outside the array.
pub fn bilinear_sample(data: &Array2<f32>, x: f64, y: f64) -> f32 {
    let (rows, cols) = data.dim();
    if !(x > -1.0 && y > -1.0 && x < cols as f64 && y < rows as f64) {
        return 0.0;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let xf = (x - x0) as f32;
    let yf = (y - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let at = |col: i64, row: i64| -> f32 {
        if col < 0 || row < 0 || col as usize >= cols || row as usize >= rows {
            0.0
        } else {
            data[[row as usize, col as usize]]
        }
    };

    let v00 = at(x0, y0);
    let v10 = at(x0 + 1, y0);
    let v01 = at(x0, y0 + 1);
    let v11 = at(x0 + 1, y0 + 1);

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_bilinear_sample() {
        let data = array![[1.0f32, 2.0], [3.0, 4.0]];

        // Corners
        assert_eq!(bilinear_sample(&data, 0.0, 0.0), 1.0);
        assert_eq!(bilinear_sample(&data, 1.0, 0.0), 2.0);
        assert_eq!(bilinear_sample(&data, 0.0, 1.0), 3.0);
        assert_eq!(bilinear_sample(&data, 1.0, 1.0), 4.0);

        // Center
        assert_eq!(bilinear_sample(&data, 0.5, 0.5), 2.5);
    }

    #[test]
    fn test_bilinear_sample_fades_to_zero_outside() {
        let data = array![[4.0f32, 4.0], [4.0, 4.0]];
        assert_eq!(bilinear_sample(&data, 1.5, 0.0), 2.0);
        assert_eq!(bilinear_sample(&data, -2.0, 0.0), 0.0);
        assert_eq!(bilinear_sample(&data, 0.0, 5.0), 0.0);
    }

    #[test]
    fn test_rotated_shape() {
        assert_eq!(rotated_shape(10, 20, 0.0), (10, 20));
        assert_eq!(rotated_shape(10, 20, 90.0), (20, 10));
        // 20 * cos45 + 10 * sin45 = 21.21
        assert_eq!(rotated_shape(10, 20, 45.0), (21, 21));
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let data = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as f32);
        assert_eq!(rotate_expand(&data, 0.0), data);
    }

    #[test]
    fn test_quarter_turn_counter_clockwise() {
        // Top-right corner moves to the top-left after a CCW quarter turn.
        let data = array![[0.0f32, 0.0, 9.0], [0.0, 0.0, 0.0]];
        let rotated = rotate_expand(&data, 90.0);
        assert_eq!(rotated.dim(), (3, 2));
        assert!((rotated[[0, 0]] - 9.0).abs() < 1e-4);
        assert!(rotated[[2, 1]].abs() < 1e-4);
    }
}
