//! Tile store: where decoded wind tile files come from.
//!
//! The simulation core only needs a way to turn `(tile, timestamp)` into a
//! readable snapshot file; everything about directory layout or retrieval
//! lives behind [`TileStore`]. The shipped implementation scans a local
//! directory of `{lat}_{lng}_{timestamp}.decoded_grib` files, the layout the
//! GRIB decoding stage produces.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::core_types::TileCoords;
use crate::wind::snapshot::WindGridConfig;

/// Why a tile store could not serve a request.
///
/// The two coverage variants are distinguished so the cache can report a
/// spatial gap (no data for the tile at all) separately from a temporal one
/// (the tile exists, but not for the requested time).
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store has no files at all for this tile.
    NoTileCoverage { tile: TileCoords },
    /// The store has files for the tile, but no snapshot window contains the
    /// requested timestamp.
    NoTimeCoverage { tile: TileCoords, timestamp: i64 },
    /// Filesystem or transport failure.
    Io(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NoTileCoverage { tile } => {
                write!(f, "no wind data files for tile {tile}")
            }
            StoreError::NoTimeCoverage { tile, timestamp } => {
                write!(f, "no wind data file for tile {tile} covers timestamp {timestamp}")
            }
            StoreError::Io(msg) => write!(f, "tile store I/O failure: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Source of decoded wind tile files.
pub trait TileStore {
    /// Open the snapshot file for `tile` whose valid window
    /// `[valid_from, valid_from + period)` contains `timestamp`.
    ///
    /// # Errors
    /// Returns a [`StoreError`] naming the coverage gap, or the I/O failure,
    /// when no such file can be opened.
    fn open(&self, tile: TileCoords, timestamp: i64) -> Result<Box<dyn Read>, StoreError>;
}

#[derive(Debug, Clone)]
struct InventoryEntry {
    valid_from: i64,
    path: PathBuf,
}

/// Tile store over a flat directory of `{lat}_{lng}_{timestamp}.decoded_grib`
/// files.
///
/// The directory is scanned once at construction; files appearing later are
/// not seen. Filenames that do not match the pattern are ignored.
#[derive(Debug)]
pub struct DirectoryTileStore {
    time_period: i64,
    inventory: FxHashMap<TileCoords, Vec<InventoryEntry>>,
}

impl DirectoryTileStore {
    /// Index the given directory.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the directory cannot be read.
    pub fn open_dir(root: impl Into<PathBuf>, config: &WindGridConfig) -> Result<Self, StoreError> {
        let root = root.into();
        let mut inventory: FxHashMap<TileCoords, Vec<InventoryEntry>> = FxHashMap::default();

        let entries = std::fs::read_dir(&root).map_err(|e| StoreError::Io(e.to_string()))?;
        let mut indexed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            let name = entry.file_name();
            let Some((tile, valid_from)) = parse_tile_name(&name.to_string_lossy()) else {
                continue;
            };
            inventory
                .entry(tile)
                .or_default()
                .push(InventoryEntry { valid_from, path: entry.path() });
            indexed += 1;
        }
        for entries in inventory.values_mut() {
            entries.sort_by_key(|e| e.valid_from);
        }
        debug!(root = %root.display(), files = indexed, "indexed wind data directory");

        Ok(Self { time_period: config.time_period, inventory })
    }
}

impl TileStore for DirectoryTileStore {
    fn open(&self, tile: TileCoords, timestamp: i64) -> Result<Box<dyn Read>, StoreError> {
        let entries = self
            .inventory
            .get(&tile)
            .ok_or(StoreError::NoTileCoverage { tile })?;
        let entry = entries
            .iter()
            .find(|e| e.valid_from <= timestamp && timestamp < e.valid_from + self.time_period)
            .ok_or(StoreError::NoTimeCoverage { tile, timestamp })?;

        info!(path = %entry.path.display(), "opening wind data file");
        let file = File::open(&entry.path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Box::new(file))
    }
}

/// Parse `{lat}_{lng}_{timestamp}.decoded_grib` into tile coordinates and a
/// valid-from timestamp.
fn parse_tile_name(name: &str) -> Option<(TileCoords, i64)> {
    let stem = name.strip_suffix(".decoded_grib")?;
    let mut parts = stem.splitn(3, '_');
    let lat = parts.next()?.parse().ok()?;
    let lng = parts.next()?.parse().ok()?;
    let valid_from = parts.next()?.parse().ok()?;
    Some((TileCoords { lat, lng }, valid_from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_store(dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            fs::write(dir.join(name), format!("contents of {name}")).unwrap();
        }
    }

    fn read_all(mut reader: Box<dyn Read>) -> String {
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_parse_tile_name() {
        assert_eq!(
            parse_tile_name("48_0_1262304000.decoded_grib"),
            Some((TileCoords { lat: 48, lng: 0 }, 1_262_304_000))
        );
        assert_eq!(
            parse_tile_name("-6_-12_1262304000.decoded_grib"),
            Some((TileCoords { lat: -6, lng: -12 }, 1_262_304_000))
        );
        assert_eq!(parse_tile_name("readme.txt"), None);
        assert_eq!(parse_tile_name("48_0.decoded_grib"), None);
    }

    #[test]
    fn test_open_picks_covering_window() {
        let dir = Path::new("/tmp/balloon_store_test_window");
        write_store(
            dir,
            &[
                "48_0_1000.decoded_grib",
                "48_0_11800.decoded_grib",
                "notes.txt",
            ],
        );

        let store = DirectoryTileStore::open_dir(dir, &WindGridConfig::default()).unwrap();
        let tile = TileCoords { lat: 48, lng: 0 };

        // Mid-window
        let text = read_all(store.open(tile, 5000).unwrap());
        assert!(text.contains("48_0_1000"));

        // Exactly at a window start the newer file wins: [start, start + period)
        let text = read_all(store.open(tile, 11_800).unwrap());
        assert!(text.contains("48_0_11800"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_open_reports_coverage_gaps() {
        let dir = Path::new("/tmp/balloon_store_test_gaps");
        write_store(dir, &["48_0_1000.decoded_grib"]);

        let store = DirectoryTileStore::open_dir(dir, &WindGridConfig::default()).unwrap();

        let missing_tile = TileCoords { lat: -6, lng: 0 };
        assert_eq!(
            store.open(missing_tile, 5000).err().unwrap(),
            StoreError::NoTileCoverage { tile: missing_tile }
        );

        let tile = TileCoords { lat: 48, lng: 0 };
        // 1000 + 10800 = 11800 is the first uncovered second
        assert_eq!(
            store.open(tile, 11_800).err().unwrap(),
            StoreError::NoTimeCoverage { tile, timestamp: 11_800 }
        );
        assert_eq!(
            store.open(tile, 999).err().unwrap(),
            StoreError::NoTimeCoverage { tile, timestamp: 999 }
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_open_dir_missing_directory_is_io_error() {
        let config = WindGridConfig::default();
        let err = DirectoryTileStore::open_dir("/tmp/balloon_store_test_absent", &config)
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
