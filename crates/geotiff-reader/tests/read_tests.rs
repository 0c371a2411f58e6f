//! Decoding tests against synthetic orthomosaics.

use geotiff_reader::{read_raster, read_raster_from_buffer, GeoTransform, RasterError};
use test_utils::{write_plain_tiff, write_rgb_geotiff, write_rgba_geotiff, FieldLayout};

#[test]
fn test_rgba_raster_declares_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("20200101_ortho.tif");
    let layout = FieldLayout::default();
    write_rgba_geotiff(&path, &layout).unwrap();

    let raster = read_raster(&path).unwrap();
    assert_eq!((raster.width, raster.height), (60, 40));
    assert_eq!(raster.band_count(), 4);
    assert_eq!(raster.alpha, Some(3));
    assert_eq!(raster.true_band_indices(), vec![0, 1, 2]);

    // A1 covers cols 5..17, rows 8..32.
    assert_eq!(raster.bands[0][[8, 5]], 120.0);
    assert_eq!(raster.bands[1][[31, 16]], 80.0);
    assert_eq!(raster.bands[2][[0, 0]], 30.0);
    assert_eq!(raster.bands[3][[20, 20]], 255.0);
}

#[test]
fn test_georeferencing_and_crs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("20200101_ortho.tif");
    write_rgba_geotiff(&path, &FieldLayout::default()).unwrap();

    let raster = read_raster(&path).unwrap();
    assert_eq!(
        raster.transform,
        GeoTransform::new(500_000.0, 4_100_040.0, 1.0, -1.0)
    );
    assert_eq!(raster.crs.as_deref(), Some("EPSG:32611"));

    let bounds = raster.bounds();
    assert_eq!(bounds.min_x, 500_000.0);
    assert_eq!(bounds.max_y, 4_100_040.0);
    assert_eq!(bounds.min_y, 4_100_000.0);
}

#[test]
fn test_rgb_raster_uses_last_band_as_mask() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("20200101_rgb.tif");
    write_rgb_geotiff(&path, &FieldLayout::default()).unwrap();

    let raster = read_raster(&path).unwrap();
    assert_eq!(raster.alpha, None);
    assert_eq!(raster.true_band_indices(), vec![0, 1, 2]);
    assert_eq!(raster.mask_band_index(), Some(2));
}

#[test]
fn test_missing_geotags_fall_back_to_pixel_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.tif");
    write_plain_tiff(&path, &FieldLayout::default()).unwrap();

    let raster = read_raster(&path).unwrap();
    assert_eq!(raster.transform, GeoTransform::identity());
    assert_eq!(raster.crs, None);
}

#[test]
fn test_read_from_buffer_matches_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("20200101_ortho.tif");
    write_rgba_geotiff(&path, &FieldLayout::default()).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let from_buffer = read_raster_from_buffer(&bytes).unwrap();
    let from_file = read_raster(&path).unwrap();
    assert_eq!(from_buffer.bands, from_file.bands);
}

#[test]
fn test_garbage_is_a_decode_error() {
    let err = read_raster_from_buffer(b"not a tiff at all").unwrap_err();
    assert!(matches!(err, RasterError::Decode(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = read_raster("/nonexistent/20200101_ortho.tif").unwrap_err();
    assert!(matches!(err, RasterError::Io(_)));
}
