//! Zarr V3 backend on the local filesystem.
//!
//! Every node becomes a directory holding a `zarr.json`. Band arrays are
//! stored as a single chunk, as plots are small once cropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, Element, ElementOwned, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs_filesystem::FilesystemStore;

use crate::backend::{Attributes, StoreBackend};
use crate::config::{StoreConfig, ZarrCompression};
use crate::error::{StoreError, StoreResult};

/// A Zarr hierarchy rooted at a directory.
pub struct ZarrBackend {
    root: PathBuf,
    store: Arc<FilesystemStore>,
    config: StoreConfig,
}

impl std::fmt::Debug for ZarrBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZarrBackend")
            .field("root", &self.root)
            .field("compression", &self.config.compression)
            .finish()
    }
}

impl ZarrBackend {
    /// Open (creating the directory if needed) a store for writing.
    pub fn create(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        config.validate().map_err(StoreError::Config)?;
        std::fs::create_dir_all(path.as_ref())?;
        Self::with_config(path, config)
    }

    /// Open an existing store.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let root = path.as_ref();
        if !root.join("zarr.json").is_file() {
            return Err(StoreError::MissingKey(format!(
                "{} is not a Zarr hierarchy",
                root.display()
            )));
        }
        Self::with_config(root, StoreConfig::default())
    }

    fn with_config(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let root = path.as_ref().to_path_buf();
        let store = FilesystemStore::new(&root).map_err(StoreError::zarr)?;
        Ok(Self {
            root,
            store: Arc::new(store),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self, path: &str) -> PathBuf {
        let relative = path.trim_start_matches('/');
        let dir = if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        };
        dir.join("zarr.json")
    }

    fn open_group(&self, path: &str) -> StoreResult<Group<FilesystemStore>> {
        if !self.node_exists(path) {
            return Err(StoreError::MissingKey(path.to_string()));
        }
        Group::open(self.store.clone(), path).map_err(StoreError::zarr)
    }

    fn open_array(&self, path: &str, expected: DataType) -> StoreResult<Array<FilesystemStore>> {
        if !self.node_exists(path) {
            return Err(StoreError::MissingKey(path.to_string()));
        }
        let array = Array::open(self.store.clone(), path).map_err(StoreError::zarr)?;
        if *array.data_type() != expected {
            return Err(StoreError::format(
                path,
                format!("expected {:?}, found {:?}", expected, array.data_type()),
            ));
        }
        Ok(array)
    }

    /// Create the compression codec based on configuration.
    fn compression_codec(
        &self,
        typesize: usize,
    ) -> StoreResult<Option<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>>> {
        let compressor = match self.config.compression {
            ZarrCompression::None => return Ok(None),
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| StoreError::Config("Invalid compression level".to_string()))?;

        // typesize is required when shuffle is enabled
        let (shuffle, typesize) = if self.config.shuffle {
            (BloscShuffleMode::Shuffle, Some(typesize))
        } else {
            (BloscShuffleMode::NoShuffle, None)
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Some(Arc::new(codec)))
    }

    /// Build and store the metadata of a single-chunk array.
    fn build_array(
        &self,
        path: &str,
        shape: Vec<u64>,
        data_type: DataType,
        fill_value: FillValue,
        typesize: usize,
    ) -> StoreResult<Array<FilesystemStore>> {
        let chunk_shape: Vec<u64> = shape.iter().map(|&n| n.max(1)).collect();
        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| StoreError::Config(format!("{:?}", e)))?;

        let mut builder = ArrayBuilder::new(shape, data_type, chunk_grid, fill_value);
        if let Some(codec) = self.compression_codec(typesize)? {
            builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(self.store.clone(), path)
            .map_err(StoreError::zarr)?;
        array.store_metadata().map_err(StoreError::zarr)?;
        Ok(array)
    }

    /// Create or overwrite a 1-D array of `T`.
    fn write_vector<T: Element>(
        &self,
        path: &str,
        values: &[T],
        data_type: DataType,
        fill_value: FillValue,
    ) -> StoreResult<()> {
        let shape = vec![values.len() as u64];
        let zarr = self.build_array(
            path,
            shape.clone(),
            data_type,
            fill_value,
            std::mem::size_of::<T>(),
        )?;
        if values.is_empty() {
            return Ok(());
        }

        let subset = ArraySubset::new_with_start_shape(vec![0], shape).map_err(StoreError::zarr)?;
        zarr.store_array_subset_elements(&subset, values)
            .map_err(StoreError::zarr)
    }

    fn read_vector<T: ElementOwned>(&self, path: &str, data_type: DataType) -> StoreResult<Vec<T>> {
        let array = self.open_array(path, data_type)?;
        let shape = array.shape().to_vec();
        match shape[..] {
            [0] => Ok(Vec::new()),
            [_] => array
                .retrieve_array_subset_elements(&array.subset_all())
                .map_err(StoreError::zarr),
            _ => Err(StoreError::format(
                path,
                format!("expected a 1-D array, found shape {:?}", shape),
            )),
        }
    }
}

impl StoreBackend for ZarrBackend {
    fn name(&self) -> &'static str {
        "zarr"
    }

    fn node_exists(&self, path: &str) -> bool {
        self.metadata_path(path).is_file()
    }

    fn create_group(&mut self, path: &str) -> StoreResult<()> {
        if self.node_exists(path) {
            return Err(StoreError::DuplicateGroup(path.to_string()));
        }
        let group = GroupBuilder::new()
            .build(self.store.clone(), path)
            .map_err(StoreError::zarr)?;
        group.store_metadata().map_err(StoreError::zarr)?;
        debug!(path, "Created group");
        Ok(())
    }

    fn write_group_attributes(&mut self, path: &str, attributes: Attributes) -> StoreResult<()> {
        if !self.node_exists(path) {
            return Err(StoreError::MissingKey(path.to_string()));
        }
        let group = GroupBuilder::new()
            .attributes(attributes)
            .build(self.store.clone(), path)
            .map_err(StoreError::zarr)?;
        group.store_metadata().map_err(StoreError::zarr)
    }

    fn group_attributes(&self, path: &str) -> StoreResult<Attributes> {
        Ok(self.open_group(path)?.attributes().clone())
    }

    fn write_f32_array(&mut self, path: &str, array: &Array2<f32>) -> StoreResult<()> {
        let (rows, cols) = array.dim();
        let shape = vec![rows as u64, cols as u64];
        let zarr = self.build_array(
            path,
            shape.clone(),
            DataType::Float32,
            FillValue::from(f32::NAN),
            std::mem::size_of::<f32>(),
        )?;
        if rows == 0 || cols == 0 {
            return Ok(());
        }

        // Zarr uses [row, col] indexing, same as ndarray.
        let data: Vec<f32> = array.iter().copied().collect();
        let subset = ArraySubset::new_with_start_shape(vec![0, 0], shape)
            .map_err(StoreError::zarr)?;
        zarr.store_array_subset_elements(&subset, &data)
            .map_err(StoreError::zarr)
    }

    fn read_f32_array(&self, path: &str) -> StoreResult<Array2<f32>> {
        let array = self.open_array(path, DataType::Float32)?;
        let shape = array.shape().to_vec();
        let [rows, cols] = shape[..] else {
            return Err(StoreError::format(
                path,
                format!("expected a 2-D array, found shape {:?}", shape),
            ));
        };
        let (rows, cols) = (rows as usize, cols as usize);
        if rows == 0 || cols == 0 {
            return Ok(Array2::zeros((rows, cols)));
        }

        let data: Vec<f32> = array
            .retrieve_array_subset_elements(&array.subset_all())
            .map_err(StoreError::zarr)?;
        Array2::from_shape_vec((rows, cols), data).map_err(|e| StoreError::format(path, e.to_string()))
    }

    fn write_f64_array(&mut self, path: &str, values: &[f64]) -> StoreResult<()> {
        self.write_vector(path, values, DataType::Float64, FillValue::from(f64::NAN))
    }

    fn read_f64_array(&self, path: &str) -> StoreResult<Vec<f64>> {
        self.read_vector(path, DataType::Float64)
    }

    fn write_i64_array(&mut self, path: &str, values: &[i64]) -> StoreResult<()> {
        self.write_vector(path, values, DataType::Int64, FillValue::from(0i64))
    }

    fn read_i64_array(&self, path: &str) -> StoreResult<Vec<i64>> {
        self.read_vector(path, DataType::Int64)
    }

    fn write_u8_array(&mut self, path: &str, values: &[u8]) -> StoreResult<()> {
        self.write_vector(path, values, DataType::UInt8, FillValue::from(0u8))
    }

    fn read_u8_array(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.read_vector(path, DataType::UInt8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_group_lifecycle() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut backend = ZarrBackend::create(temp_dir.path().join("store.zarr"), StoreConfig::default())
            .expect("Failed to create store");

        backend.create_group("/").unwrap();
        backend.create_group("/dates").unwrap();
        assert!(backend.node_exists("/"));
        assert!(backend.node_exists("/dates"));
        assert!(!backend.node_exists("/ldata"));
        assert!(matches!(
            backend.create_group("/dates"),
            Err(StoreError::DuplicateGroup(_))
        ));

        let mut attrs = Attributes::new();
        attrs.insert("children".to_string(), serde_json::json!(["20200101"]));
        backend.write_group_attributes("/dates", attrs.clone()).unwrap();
        assert_eq!(backend.group_attributes("/dates").unwrap(), attrs);
    }

    #[test]
    fn test_arrays_roundtrip_compressed() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut backend = ZarrBackend::create(temp_dir.path(), StoreConfig::default())
            .expect("Failed to create store");
        backend.create_group("/").unwrap();

        let band = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 0.25]];
        backend.write_f32_array("/band", &band).unwrap();
        assert_eq!(backend.read_f32_array("/band").unwrap(), band);

        let column = vec![0.1, 0.2, f64::NAN];
        backend.write_f64_array("/column", &column).unwrap();
        let read = backend.read_f64_array("/column").unwrap();
        assert_eq!(read[..2], column[..2]);
        assert!(read[2].is_nan());

        backend.write_u8_array("/bytes", "A1é".as_bytes()).unwrap();
        assert_eq!(backend.read_u8_array("/bytes").unwrap(), "A1é".as_bytes());
        backend.write_i64_array("/lengths", &[2, -1, 0]).unwrap();
        assert_eq!(backend.read_i64_array("/lengths").unwrap(), vec![2, -1, 0]);

        // Wrong data type is reported, not reinterpreted.
        assert!(matches!(
            backend.read_f64_array("/band"),
            Err(StoreError::Format { .. })
        ));
    }

    #[test]
    fn test_overwrite_with_new_shape() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut backend = ZarrBackend::create(temp_dir.path(), StoreConfig::uncompressed())
            .expect("Failed to create store");

        backend.write_f32_array("/a", &Array2::zeros((4, 4))).unwrap();
        let smaller = Array2::from_elem((2, 3), 7.0f32);
        backend.write_f32_array("/a", &smaller).unwrap();
        assert_eq!(backend.read_f32_array("/a").unwrap(), smaller);
    }

    #[test]
    fn test_open_requires_root_metadata() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        assert!(matches!(
            ZarrBackend::open(temp_dir.path()),
            Err(StoreError::MissingKey(_))
        ));
    }

    #[test]
    fn test_missing_array() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let backend = ZarrBackend::create(temp_dir.path(), StoreConfig::default()).unwrap();
        assert!(matches!(
            backend.read_f32_array("/nope"),
            Err(StoreError::MissingKey(_))
        ));
    }
}
