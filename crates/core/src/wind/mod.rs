//! Wind dataset access.
//!
//! Decoded forecast files are read through a [`TileStore`], held resident as
//! a past/future [`WindSnapshot`] pair by the [`TileCache`], and queried
//! through [`sample`].

pub mod cache;
pub mod sampler;
pub mod snapshot;
pub mod store;

pub use cache::{TileCache, TileCacheEntry};
pub use sampler::{sample, WindSample};
pub use snapshot::{WindGridConfig, WindGridPoint, WindSnapshot};
pub use store::{DirectoryTileStore, StoreError, TileStore};
