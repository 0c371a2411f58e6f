//! Hierarchical store for extracted plot arrays.
//!
//! The store nests arrays as date → plot → band and keeps the band names and
//! the summary table beside them, so a whole project can be persisted and
//! reloaded. Two backends implement [`StoreBackend`]:
//!
//! - [`MemoryBackend`]: plain in-memory map, used before a project is saved
//! - [`ZarrBackend`]: Zarr V3 hierarchy on the local filesystem
//!
//! # Example
//!
//! ```ignore
//! use plot_store::{load_archive, save_archive, StoreConfig, ZarrBackend};
//!
//! let mut backend = ZarrBackend::create("project.zarr", StoreConfig::default())?;
//! save_archive(&mut backend, &tree, &bands_name, &table)?;
//! let archive = load_archive(&ZarrBackend::open("project.zarr")?)?;
//! ```

pub mod archive;
pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod zarr;

pub use archive::{is_initialized, load_archive, save_archive, validate_node_name, Archive};
pub use backend::{Attributes, StoreBackend};
pub use config::{StoreConfig, ZarrCompression};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use zarr::ZarrBackend;
