//! Integration test: save an archive to Zarr V3 and read it back.

use ndarray::Array2;
use plot_common::{BandTree, Column, DateGroup, PlotGroup, PlotTable, DATE_COLUMN, ID_COLUMN};
use plot_store::{
    is_initialized, load_archive, save_archive, MemoryBackend, StoreBackend, StoreConfig,
    ZarrBackend, ZarrCompression,
};

/// Value at (row, col) = plot * 1000 + row * 10 + col (for easy verification)
fn create_band(plot: usize, rows: usize, cols: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| (plot * 1000 + r * 10 + c) as f32)
}

fn create_tree() -> BandTree {
    let mut tree = BandTree::new();
    for date in ["20200101", "20200115"] {
        let mut group = DateGroup::new(date);
        for (i, id) in ["A1", "A2", "B1"].iter().enumerate() {
            let mut plot = PlotGroup::new(*id);
            // Cropped plots differ in shape.
            plot.insert_band("red", create_band(i, 20 + i, 8)).unwrap();
            plot.insert_band("green", create_band(i + 10, 20 + i, 8)).unwrap();
            group.insert_plot(plot).unwrap();
        }
        tree.insert_date(group).unwrap();
    }
    tree
}

fn create_table() -> PlotTable {
    let ids = ["A1", "A2", "B1", "A1", "A2", "B1"];
    let dates = ["20200101", "20200101", "20200101", "20200115", "20200115", "20200115"];
    PlotTable::from_columns(vec![
        Column::text(ID_COLUMN, ids.iter().map(|s| Some(s.to_string())).collect()),
        Column::text(DATE_COLUMN, dates.iter().map(|s| Some(s.to_string())).collect()),
        Column::numbers("red", vec![0.1, 0.2, 0.3, 0.4, 0.5, 1.0 / 3.0]),
        Column::numbers("green", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        Column::text("genotype", vec![Some("G1".to_string()), None, None, None, None, None]),
    ])
    .unwrap()
}

fn bands() -> Vec<String> {
    vec!["red".to_string(), "green".to_string()]
}

#[test]
fn test_zarr_roundtrip_full_archive() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let zarr_path = temp_dir.path().join("project.zarr");

    let mut backend =
        ZarrBackend::create(&zarr_path, StoreConfig::default()).expect("Failed to create store");
    save_archive(&mut backend, &create_tree(), &bands(), &create_table())
        .expect("Failed to save");

    let reopened = ZarrBackend::open(&zarr_path).expect("Failed to open store");
    assert!(is_initialized(&reopened));
    let archive = load_archive(&reopened).expect("Failed to load");

    assert_eq!(archive.bands_name, bands());
    assert_eq!(archive.tree, create_tree());
    assert_eq!(archive.table, create_table());
    // Bit-exact numeric columns.
    assert_eq!(
        archive.table.numbers("red").unwrap()[5].to_bits(),
        (1.0f64 / 3.0).to_bits()
    );
}

#[test]
fn test_zarr_and_memory_agree() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = StoreConfig {
        compression: ZarrCompression::BloscLz4,
        compression_level: 5,
        shuffle: false,
    };
    let mut zarr = ZarrBackend::create(temp_dir.path(), config).unwrap();
    let mut memory = MemoryBackend::new();

    save_archive(&mut zarr, &create_tree(), &bands(), &create_table()).unwrap();
    save_archive(&mut memory, &create_tree(), &bands(), &create_table()).unwrap();

    assert_eq!(load_archive(&zarr).unwrap(), load_archive(&memory).unwrap());
}

#[test]
fn test_zarr_repeat_save_is_idempotent() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut backend = ZarrBackend::create(temp_dir.path(), StoreConfig::uncompressed()).unwrap();

    save_archive(&mut backend, &create_tree(), &bands(), &create_table()).unwrap();
    save_archive(&mut backend, &create_tree(), &bands(), &create_table()).unwrap();

    let archive = load_archive(&backend).unwrap();
    assert_eq!(archive.tree.date_keys(), vec!["20200101", "20200115"]);
    assert_eq!(archive.table.n_rows(), 6);
    assert!(backend.node_exists("/dates/20200115/B1/green"));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = StoreConfig {
        compression_level: 12,
        ..StoreConfig::default()
    };
    assert!(ZarrBackend::create(temp_dir.path(), config).is_err());
}
