//! Two-snapshot tile cache.
//!
//! The integrator interpolates wind between a `past` and a `future` snapshot
//! of the tile the flight is in. This cache owns exactly those two handles
//! and swaps them as simulated time advances: in the common case the old
//! `future` becomes the new `past` (a move, not a reload) and only the next
//! snapshot is read from the store. The load at a window boundary is the only
//! blocking I/O in a run.

use tracing::{debug, info};

use crate::core_types::TileCoords;
use crate::error::{ConfigError, DataError};
use crate::wind::snapshot::{WindGridConfig, WindSnapshot};
use crate::wind::store::{StoreError, TileStore};

/// One resident snapshot handle, owned by the cache.
#[derive(Debug, Clone)]
pub struct TileCacheEntry {
    snapshot: WindSnapshot,
}

impl TileCacheEntry {
    /// The snapshot this handle holds.
    #[must_use]
    pub fn snapshot(&self) -> &WindSnapshot {
        &self.snapshot
    }

    /// Tile the snapshot covers.
    #[must_use]
    pub fn tile(&self) -> TileCoords {
        self.snapshot.tile()
    }

    /// Unix timestamp the snapshot is valid from.
    #[must_use]
    pub fn valid_from(&self) -> i64 {
        self.snapshot.valid_from()
    }
}

/// Keeps the current past/future snapshot pair resident.
#[derive(Debug)]
pub struct TileCache<S> {
    store: S,
    config: WindGridConfig,
    past: Option<TileCacheEntry>,
    future: Option<TileCacheEntry>,
}

impl<S: TileStore> TileCache<S> {
    /// Create an empty cache over the given store.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the grid configuration is inconsistent.
    pub fn new(store: S, config: WindGridConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { store, config, past: None, future: None })
    }

    /// Grid configuration this cache validates files against.
    #[must_use]
    pub fn config(&self) -> &WindGridConfig {
        &self.config
    }

    /// Return the snapshot pair bracketing `timestamp` for the tile
    /// containing the point.
    ///
    /// Held handles are reused where they can serve the request: a pair that
    /// still brackets the timestamp is returned as-is, and when the flight
    /// has moved one window forward the old `future` handle is transferred to
    /// the `past` slot so only the new `future` is loaded. Handles for other
    /// tiles or stale windows are released.
    ///
    /// # Errors
    /// Any [`DataError`] is fatal to the run: a coverage gap in the store, a
    /// malformed file, or snapshots that do not line up one period apart.
    pub fn acquire_window(
        &mut self,
        latitude: f64,
        longitude: f64,
        timestamp: i64,
    ) -> Result<(&TileCacheEntry, &TileCacheEntry), DataError> {
        let tile = TileCoords::containing(latitude, longitude, self.config.tile_size);
        let period = self.config.time_period;

        let past_slot = self.past.take();
        let future_slot = self.future.take();

        let (past, future) = match (past_slot, future_slot) {
            // The held pair still brackets the timestamp. A timestamp exactly
            // at the future snapshot is served by the old pair (temporal
            // fraction 1); the next second advances the window.
            (Some(p), Some(f))
                if p.tile() == tile
                    && f.tile() == tile
                    && p.valid_from() <= timestamp
                    && timestamp <= f.valid_from() =>
            {
                debug!(%tile, timestamp, "wind window already resident");
                (p, f)
            }
            // Simulated time has entered the old future's window: transfer
            // the handle and load only its successor.
            (_, Some(f))
                if f.tile() == tile
                    && f.valid_from() <= timestamp
                    && timestamp < f.valid_from() + period =>
            {
                let next = self.load(tile, f.valid_from() + period)?;
                self.check_contiguous(&f, &next)?;
                info!(
                    %tile,
                    past = f.valid_from(),
                    future = next.valid_from(),
                    "advanced wind window"
                );
                (f, next)
            }
            // Anything else means a fresh pair: first flight step, a tile
            // change, or a jump in time.
            _ => {
                let p = self.load(tile, timestamp)?;
                let f = self.load(tile, p.valid_from() + period)?;
                self.check_contiguous(&p, &f)?;
                info!(
                    %tile,
                    past = p.valid_from(),
                    future = f.valid_from(),
                    "loaded wind window"
                );
                (p, f)
            }
        };

        let past_ref: &TileCacheEntry = self.past.insert(past);
        let future_ref: &TileCacheEntry = self.future.insert(future);
        Ok((past_ref, future_ref))
    }

    /// Load and validate the snapshot whose window contains `timestamp`.
    fn load(&self, tile: TileCoords, timestamp: i64) -> Result<TileCacheEntry, DataError> {
        let reader = self.store.open(tile, timestamp).map_err(|e| match e {
            StoreError::NoTileCoverage { tile } => DataError::SpatialGap { tile },
            StoreError::NoTimeCoverage { tile, timestamp } => {
                DataError::TemporalGap { tile, timestamp }
            }
            StoreError::Io(msg) => DataError::Store(msg),
        })?;

        let snapshot = WindSnapshot::parse(reader, &self.config, tile).map_err(DataError::Format)?;

        // The header must agree with the window the store claimed to serve
        let valid_from = snapshot.valid_from();
        if timestamp < valid_from || timestamp >= valid_from + self.config.time_period {
            return Err(DataError::WindowMismatch { valid_from, timestamp });
        }

        Ok(TileCacheEntry { snapshot })
    }

    fn check_contiguous(
        &self,
        past: &TileCacheEntry,
        future: &TileCacheEntry,
    ) -> Result<(), DataError> {
        let period = self.config.time_period;
        if future.valid_from() - past.valid_from() == period {
            Ok(())
        } else {
            Err(DataError::NonContiguousWindow {
                past_start: past.valid_from(),
                future_start: future.valid_from(),
                period,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::{Cursor, Read};

    /// In-memory store of generated tile texts with an open counter.
    struct MemoryStore {
        period: i64,
        files: Vec<(TileCoords, i64, String)>,
        opens: Cell<usize>,
    }

    impl MemoryStore {
        fn new(files: Vec<(TileCoords, i64)>) -> Self {
            let rendered = files
                .into_iter()
                .map(|(tile, start)| (tile, start, tile_text(tile, start)))
                .collect();
            Self { period: 10_800, files: rendered, opens: Cell::new(0) }
        }
    }

    impl TileStore for MemoryStore {
        fn open(&self, tile: TileCoords, timestamp: i64) -> Result<Box<dyn Read>, StoreError> {
            self.opens.set(self.opens.get() + 1);
            let mut saw_tile = false;
            for (file_tile, start, text) in &self.files {
                if *file_tile != tile {
                    continue;
                }
                saw_tile = true;
                if *start <= timestamp && timestamp < *start + self.period {
                    return Ok(Box::new(Cursor::new(text.clone().into_bytes())));
                }
            }
            if saw_tile {
                Err(StoreError::NoTimeCoverage { tile, timestamp })
            } else {
                Err(StoreError::NoTileCoverage { tile })
            }
        }
    }

    /// Minimal well-formed tile text: uniform wind, two pressure levels.
    fn tile_text(tile: TileCoords, valid_from: i64) -> String {
        let config = WindGridConfig::default();
        let points = config.points_per_side();
        let mut text = format!(
            "6371229.0,{points},{points},{},{},{},{},{valid_from}\n",
            tile.lat,
            tile.lng,
            f64::from(tile.lat) + config.tile_size,
            f64::from(tile.lng) + config.tile_size,
        );
        for (pressure, altitude) in [(850, 1_500.0), (250, 10_500.0)] {
            for (row_type, value) in [(-1, 5.0), (-2, -3.0), (-3, altitude)] {
                let values: Vec<String> =
                    (0..points * points).map(|_| format!("{value}")).collect();
                text.push_str(&format!("{row_type}, {pressure}, {}\n", values.join(", ")));
            }
        }
        text
    }

    const TILE: TileCoords = TileCoords { lat: 48, lng: 0 };

    #[test]
    fn test_initial_acquire_loads_bracketing_pair() {
        let store = MemoryStore::new(vec![(TILE, 0), (TILE, 10_800), (TILE, 21_600)]);
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        let (past, future) = cache.acquire_window(50.0, 2.0, 4_000).unwrap();
        assert_eq!(past.valid_from(), 0);
        assert_eq!(future.valid_from(), 10_800);
        assert_eq!(past.tile(), TILE);
        assert_eq!(cache.store.opens.get(), 2);
    }

    #[test]
    fn test_resident_window_is_not_reloaded() {
        let store = MemoryStore::new(vec![(TILE, 0), (TILE, 10_800)]);
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        cache.acquire_window(50.0, 2.0, 100).unwrap();
        assert_eq!(cache.store.opens.get(), 2);

        // Anywhere up to and including the future timestamp is a hit
        cache.acquire_window(50.0, 2.0, 9_000).unwrap();
        cache.acquire_window(50.0, 2.0, 10_800).unwrap();
        assert_eq!(cache.store.opens.get(), 2);
    }

    #[test]
    fn test_window_advance_transfers_future_handle() {
        let store = MemoryStore::new(vec![(TILE, 0), (TILE, 10_800), (TILE, 21_600)]);
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        cache.acquire_window(50.0, 2.0, 100).unwrap();
        assert_eq!(cache.store.opens.get(), 2);

        // One second past the old future: exactly one new load
        let (past, future) = cache.acquire_window(50.0, 2.0, 10_801).unwrap();
        assert_eq!(past.valid_from(), 10_800);
        assert_eq!(future.valid_from(), 21_600);
        assert_eq!(cache.store.opens.get(), 3);
    }

    #[test]
    fn test_tile_change_reloads_both() {
        let other = TileCoords { lat: 48, lng: 6 };
        let store = MemoryStore::new(vec![
            (TILE, 0),
            (TILE, 10_800),
            (other, 0),
            (other, 10_800),
        ]);
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        cache.acquire_window(50.0, 2.0, 100).unwrap();
        assert_eq!(cache.store.opens.get(), 2);

        let (past, _) = cache.acquire_window(50.0, 6.5, 100).unwrap();
        assert_eq!(past.tile(), other);
        assert_eq!(cache.store.opens.get(), 4);
    }

    #[test]
    fn test_missing_tile_is_spatial_gap() {
        let store = MemoryStore::new(vec![(TILE, 0)]);
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        let err = cache.acquire_window(-3.0, 2.0, 100).unwrap_err();
        assert_eq!(err, DataError::SpatialGap { tile: TileCoords { lat: -6, lng: 0 } });
    }

    #[test]
    fn test_missing_follow_on_snapshot_is_temporal_gap() {
        // Only one snapshot: the future load at t=10800 must fail
        let store = MemoryStore::new(vec![(TILE, 0)]);
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        let err = cache.acquire_window(50.0, 2.0, 100).unwrap_err();
        assert_eq!(err, DataError::TemporalGap { tile: TILE, timestamp: 10_800 });
    }

    #[test]
    fn test_overlapping_snapshots_are_non_contiguous() {
        // Second snapshot starts mid-window: the pair is 7200 s apart, not
        // one full period
        let store = MemoryStore::new(vec![(TILE, 0), (TILE, 7_200)]);
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        let err = cache.acquire_window(50.0, 2.0, 100).unwrap_err();
        assert_eq!(
            err,
            DataError::NonContiguousWindow {
                past_start: 0,
                future_start: 7_200,
                period: 10_800,
            }
        );
    }

    #[test]
    fn test_header_outside_served_window_is_rejected() {
        let mut store = MemoryStore::new(vec![]);
        // Store claims [0, 10800) but the file header says 36000
        store.files.push((TILE, 0, tile_text(TILE, 36_000)));
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        let err = cache.acquire_window(50.0, 2.0, 100).unwrap_err();
        assert_eq!(err, DataError::WindowMismatch { valid_from: 36_000, timestamp: 100 });
    }

    #[test]
    fn test_tile_floor_routes_negative_coordinates() {
        let tile = TileCoords { lat: -6, lng: -6 };
        let store = MemoryStore::new(vec![(tile, 0), (tile, 10_800)]);
        let mut cache = TileCache::new(store, WindGridConfig::default()).unwrap();

        let (past, _) = cache.acquire_window(-0.5, -0.5, 100).unwrap();
        assert_eq!(past.tile(), tile);
    }
}
