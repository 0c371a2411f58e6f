//! End-to-end extraction over synthetic orthomosaics.

use plot_common::{PlotError, DATE_COLUMN, ID_COLUMN};
use plot_extraction::{
    extract_raster, process_folder, read_grid, ExtractionConfig, PlotSummary,
};
use test_utils::{
    assert_approx_eq, grid_geojson, write_grid_geojson, write_rgb_geotiff, FieldLayout,
    FieldScene, PlotSpec,
};

fn summary<'a>(summaries: &'a [PlotSummary], id: &str) -> &'a PlotSummary {
    summaries.iter().find(|s| s.plot_id == id).unwrap()
}

#[test]
fn test_extract_raster_means_and_arrays() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    let raster = scene.add_flight("20200101", |v| v).unwrap();
    let grid = read_grid(scene.grid_path(), "plot").unwrap();

    let extraction =
        extract_raster(&raster, &grid, None, &ExtractionConfig::default()).unwrap();
    assert_eq!(extraction.date, "20200101");
    assert_eq!(extraction.bands_name, vec!["band_1", "band_2", "band_3"]);
    assert!(extraction.failures.is_empty());

    let a1 = summary(&extraction.summaries, "A1");
    assert_eq!(a1.plot_index, 1);
    assert_approx_eq!(a1.means[0], 120.0, 1e-4);
    assert_approx_eq!(a1.means[1], 80.0, 1e-4);
    assert_approx_eq!(a1.means[2], 40.0, 1e-4);

    let a2 = summary(&extraction.summaries, "A2");
    assert_eq!(a2.plot_index, 2);
    assert_approx_eq!(a2.means[0], 200.0, 1e-4);

    // 12 x 24 px footprint, 2 px trimmed from every side.
    let red = extraction.arrays.plot("A1").unwrap().band("band_1").unwrap();
    assert_eq!(red.dim(), (20, 8));
}

#[test]
fn test_named_bands_must_match_band_count() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    let raster = scene.add_flight("20200101", |v| v).unwrap();
    let grid = read_grid(scene.grid_path(), "plot").unwrap();
    let names = vec!["red".to_string(), "green".to_string()];

    let err = extract_raster(&raster, &grid, Some(names.as_slice()), &ExtractionConfig::default())
        .unwrap_err();
    match err {
        PlotError::Extraction { plot, file, .. } => {
            assert_eq!(plot, None);
            assert_eq!(file, "20200101_ortho.tif");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_rgb_raster_without_alpha() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    let raster = scene.raster_dir().join("20200101_rgb.tif");
    write_rgb_geotiff(&raster, &scene.layout).unwrap();
    let grid = read_grid(scene.grid_path(), "plot").unwrap();

    let extraction =
        extract_raster(&raster, &grid, None, &ExtractionConfig::default()).unwrap();
    // The last band is both a true band and the footprint source.
    assert_eq!(extraction.bands_name.len(), 3);
    assert_approx_eq!(summary(&extraction.summaries, "A2").means[2], 60.0, 1e-4);
}

#[test]
fn test_process_folder_rows_per_plot_and_date() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    scene.add_flight("20200115", |v| v / 2).unwrap();
    scene.add_flight("20200101", |v| v).unwrap();
    scene.add_flight("20200130", |v| v / 4).unwrap();

    let names: Vec<String> = ["red", "green", "blue"].iter().map(|s| s.to_string()).collect();
    let output = process_folder(
        scene.raster_dir(),
        scene.grid_path(),
        "plot",
        Some(names.as_slice()),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert!(output.failures.is_empty());
    assert_eq!(output.table.n_rows(), 6);
    assert_eq!(
        output.table.column_names(),
        vec![ID_COLUMN, DATE_COLUMN, "red", "green", "blue"]
    );
    assert_eq!(output.table.unique_dates(), vec!["20200101", "20200115", "20200130"]);
    assert_eq!(output.tree.date_keys(), vec!["20200101", "20200115", "20200130"]);
    assert_eq!(output.tree.n_arrays(), 3 * 2 * 3);
    assert_eq!(output.bands_name, names);

    let red = output.table.numbers("red").unwrap();
    assert_approx_eq!(red[2], 60.0, 1e-4);
}

#[test]
fn test_files_without_date_are_skipped() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    scene.add_flight("20200101", |v| v).unwrap();
    let undated = scene.raster_dir().join("ortho.tif");
    test_utils::write_rgba_geotiff(&undated, &scene.layout).unwrap();
    std::fs::write(scene.raster_dir().join("20200102_notes.txt"), "not a raster").unwrap();

    let output = process_folder(
        scene.raster_dir(),
        scene.grid_path(),
        "plot",
        None,
        &ExtractionConfig::default(),
    )
    .unwrap();
    assert_eq!(output.skipped, vec![undated]);
    assert_eq!(output.table.n_rows(), 2);
}

#[test]
fn test_failures_are_isolated() {
    let mut layout = FieldLayout::default();
    layout.plots.push(PlotSpec {
        id: "OUT".to_string(),
        col0: 200,
        row0: 8,
        cols: 10,
        rows: 20,
        values: [1, 1, 1],
        genotype: None,
    });
    let scene = FieldScene::new(layout, "plot").unwrap();
    scene.add_flight("20200101", |v| v).unwrap();
    // Sorts first, so the plain 20200101 raster is the duplicate.
    scene.add_flight("20200101_copy", |v| v).unwrap();

    let output = process_folder(
        scene.raster_dir(),
        scene.grid_path(),
        "plot",
        None,
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(output.table.n_rows(), 2);
    assert_eq!(output.failures.len(), 2);
    let plot_failure = output
        .failures
        .iter()
        .find(|f| f.plot.as_deref() == Some("OUT"))
        .unwrap();
    assert_eq!(plot_failure.error.kind(), "extraction");
    assert!(output
        .failures
        .iter()
        .any(|f| f.plot.is_none() && f.file == "20200101_ortho.tif"));
}

#[test]
fn test_grid_attributes_joined_on_id() {
    let layout = FieldLayout::default().with_genotypes(&["G1", "G2"]);
    let scene = FieldScene::new(layout, "plot").unwrap();
    scene.add_flight("20200101", |v| v).unwrap();

    let output = process_folder(
        scene.raster_dir(),
        scene.grid_path(),
        "plot",
        None,
        &ExtractionConfig::default(),
    )
    .unwrap();
    let genotype = output.table.text("genotype").unwrap();
    let ids = output.table.text(ID_COLUMN).unwrap();
    for (id, genotype) in ids.iter().zip(genotype) {
        let expected = if id.as_deref() == Some("A1") { "G1" } else { "G2" };
        assert_eq!(genotype.as_deref(), Some(expected));
    }
}

#[test]
fn test_colliding_grid_attributes_are_prefixed() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    let mut grid = grid_geojson(&scene.layout, "plot");
    for feature in grid["features"].as_array_mut().unwrap() {
        feature["properties"]["date"] = serde_json::json!("sown-2019");
        feature["properties"]["red"] = serde_json::json!(7);
    }
    std::fs::write(scene.grid_path(), grid.to_string()).unwrap();
    scene.add_flight("20200101", |v| v).unwrap();

    let names: Vec<String> = ["red", "green", "blue"].iter().map(|s| s.to_string()).collect();
    let output = process_folder(
        scene.raster_dir(),
        scene.grid_path(),
        "plot",
        Some(names.as_slice()),
        &ExtractionConfig::default(),
    )
    .unwrap();

    assert_eq!(output.table.n_rows(), 2);
    assert_eq!(
        output.table.column_names(),
        vec![ID_COLUMN, DATE_COLUMN, "red", "green", "blue", "grid_date", "grid_red"]
    );
    assert_eq!(output.table.unique_dates(), vec!["20200101"]);
    assert_eq!(
        output.table.text("grid_date").unwrap()[0].as_deref(),
        Some("sown-2019")
    );
    assert_eq!(output.table.numbers("grid_red").unwrap(), &[7.0, 7.0]);
}

#[test]
fn test_reserved_band_names_rejected_up_front() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    scene.add_flight("20200101", |v| v).unwrap();

    for names in [["id", "g", "b"], ["r", "g", "r"]] {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let err = process_folder(
            scene.raster_dir(),
            scene.grid_path(),
            "plot",
            Some(names.as_slice()),
            &ExtractionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "usage");
        assert!(err.to_string().contains(&format!("'{}'", names[0])), "{err}");
    }
}

#[test]
fn test_all_rasters_failing_reports_first_failure() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    scene.add_flight("20200101", |v| v).unwrap();
    let names = vec!["red".to_string(), "green".to_string()];

    let err = process_folder(
        scene.raster_dir(),
        scene.grid_path(),
        "plot",
        Some(names.as_slice()),
        &ExtractionConfig::default(),
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("20200101_ortho.tif"), "{message}");
    assert!(message.contains("2 band names given for 3 bands"), "{message}");
}

#[test]
fn test_empty_folder_is_an_error() {
    let scene = FieldScene::new(FieldLayout::default(), "plot").unwrap();
    let result = process_folder(
        scene.raster_dir(),
        scene.grid_path(),
        "plot",
        None,
        &ExtractionConfig::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_unsupported_grid_extension() {
    let dir = tempfile::tempdir().unwrap();
    let grid = dir.path().join("grid.shp");
    write_grid_geojson(&grid, &FieldLayout::default(), "plot").unwrap();
    let err = read_grid(&grid, "plot").unwrap_err();
    assert!(matches!(err, PlotError::Format(_)));
}
