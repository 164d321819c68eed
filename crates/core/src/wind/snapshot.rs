//! Wind snapshot grid and the decoded tile file parser.
//!
//! One snapshot is a complete wind grid covering one geographic tile at one
//! valid-timestamp. The grid spans `P x P` points per pressure level, where
//! `P = tile_size / resolution + 1` (both tile edges inclusive), with a
//! variable number of pressure levels taken from the file. Grid index 0 is
//! the tile's southwest corner and latitude index grows northward.
//!
//! The file layout is the flat text format produced by the GRIB decoding
//! stage (out of scope here): a header line
//!
//! ```text
//! radius_of_earth,u_size,v_size,lat_min,lng_min,lat_max,lng_max,start_timestamp
//! ```
//!
//! followed by three rows per pressure level, each row a
//! `row_type, pressure` pair and then `u_size * v_size` comma-separated
//! values in row-major order (latitude major). Row types are -1 for `wind_u`,
//! -2 for `wind_v` and -3 for the geopotential altitude of the level.

use std::io::{BufRead, BufReader, Read};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core_types::TileCoords;
use crate::error::{ConfigError, FormatError};

/// Geometry and cadence of the decoded tile dataset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindGridConfig {
    /// Width and height of one tile in degrees.
    pub tile_size: f64,
    /// Grid spacing in degrees.
    pub resolution: f64,
    /// Seconds between consecutive snapshots of a tile.
    pub time_period: i64,
}

impl Default for WindGridConfig {
    fn default() -> Self {
        // The GFS half-degree dataset cut into 6 degree tiles every 3 hours
        Self {
            tile_size: 6.0,
            resolution: 0.5,
            time_period: 10_800,
        }
    }
}

impl WindGridConfig {
    /// Grid points along one side of a tile, both edges inclusive.
    #[must_use]
    pub fn points_per_side(&self) -> usize {
        (self.tile_size / self.resolution) as usize + 1
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if a dimension is not positive or the tile
    /// size is not a whole multiple of the resolution.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size.is_nan() || self.tile_size <= 0.0 {
            return Err(ConfigError::NonPositive { name: "tile_size", value: self.tile_size });
        }
        if self.resolution.is_nan() || self.resolution <= 0.0 {
            return Err(ConfigError::NonPositive { name: "resolution", value: self.resolution });
        }
        if self.time_period <= 0 {
            return Err(ConfigError::NonPositive {
                name: "time_period",
                value: self.time_period as f64,
            });
        }
        let steps = self.tile_size / self.resolution;
        if (steps - steps.round()).abs() > 1e-9 {
            return Err(ConfigError::OutOfRange { name: "resolution", value: self.resolution });
        }
        Ok(())
    }
}

/// One grid node: the altitude of a pressure level at a point, and the wind
/// there.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindGridPoint {
    /// Geopotential altitude of the pressure level at this point (m).
    pub altitude: f64,
    /// Zonal wind, positive eastward (m/s).
    pub wind_u: f64,
    /// Meridional wind, positive northward (m/s).
    pub wind_v: f64,
}

/// A complete wind grid for one tile at one valid-timestamp.
#[derive(Debug, Clone)]
pub struct WindSnapshot {
    tile: TileCoords,
    valid_from: i64,
    radius_of_earth: f64,
    resolution: f64,
    points_per_side: usize,
    level_count: usize,
    /// Flattened grid, level major:
    /// `index = (level * P + lat_index) * P + lng_index`.
    grid: Vec<WindGridPoint>,
}

impl WindSnapshot {
    /// Parse one decoded tile file.
    ///
    /// The caller names the tile it expects the file to cover; a header
    /// disagreeing with it is rejected, as are layout violations.
    ///
    /// # Errors
    /// Returns the specific [`FormatError`] describing the first violated
    /// expectation.
    pub fn parse(
        reader: impl Read,
        config: &WindGridConfig,
        tile: TileCoords,
    ) -> Result<Self, FormatError> {
        let mut lines = BufReader::new(reader).lines().enumerate();
        let points = config.points_per_side();

        let (header_line_no, header) = loop {
            match lines.next() {
                Some((index, line)) => {
                    let line = line.map_err(|e| FormatError::Read(e.to_string()))?;
                    if !line.trim().is_empty() {
                        break (index + 1, line);
                    }
                }
                None => return Err(FormatError::HeaderFieldCount { found: 0 }),
            }
        };

        let fields: Vec<&str> = header.split(',').map(str::trim).collect();
        if fields.len() != 8 {
            return Err(FormatError::HeaderFieldCount { found: fields.len() });
        }
        let radius_of_earth = parse_f64(fields[0], header_line_no)?;
        let u_size = parse_usize(fields[1], header_line_no)?;
        let v_size = parse_usize(fields[2], header_line_no)?;
        let lat_min = parse_f64(fields[3], header_line_no)?;
        let lng_min = parse_f64(fields[4], header_line_no)?;
        let lat_max = parse_f64(fields[5], header_line_no)?;
        let lng_max = parse_f64(fields[6], header_line_no)?;
        let valid_from = parse_i64(fields[7], header_line_no)?;

        debug!(
            radius_of_earth,
            u_size, v_size, lat_min, lng_min, lat_max, lng_max, valid_from,
            "parsed wind tile header"
        );

        if u_size != points || v_size != points {
            return Err(FormatError::GridSize { u_size, v_size, expected: points });
        }

        let lat_resolution = (lat_max - lat_min) / (u_size - 1) as f64;
        let lng_resolution = (lng_max - lng_min) / (v_size - 1) as f64;
        for found in [lat_resolution, lng_resolution] {
            if (found - config.resolution).abs() > 1e-9 {
                return Err(FormatError::Resolution { found, expected: config.resolution });
            }
        }

        if (lat_min - f64::from(tile.lat)).abs() > 1e-9
            || (lng_min - f64::from(tile.lng)).abs() > 1e-9
        {
            return Err(FormatError::TileMismatch { file_lat: lat_min, file_lng: lng_min, tile });
        }

        let plane = points * points;
        let mut grid: Vec<WindGridPoint> = Vec::new();
        let mut row_count = 0usize;
        let mut seen = [false; 3];

        for (index, line) in lines {
            let line = line.map_err(|e| FormatError::Read(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = index + 1;
            let mut tokens = line.split(',').map(str::trim).filter(|t| !t.is_empty());

            let row_type = match tokens.next() {
                Some(token) => parse_i64(token, line_no)?,
                None => continue,
            };
            let component = match row_type {
                -1 | -2 | -3 => (-row_type - 1) as usize,
                other => {
                    return Err(FormatError::UnknownRowType { row: row_count + 1, row_type: other })
                }
            };
            // The pressure value itself is provenance only; the grid keys
            // levels by file order.
            match tokens.next() {
                Some(token) => {
                    parse_f64(token, line_no)?;
                }
                None => {
                    return Err(FormatError::ValueCount {
                        row: row_count + 1,
                        found: 0,
                        expected: plane,
                    })
                }
            }

            let level = row_count / 3;
            if row_count % 3 == 0 {
                grid.resize(plane * (level + 1), WindGridPoint::default());
                seen = [false; 3];
            }
            seen[component] = true;

            let mut found = 0usize;
            for token in tokens {
                let value = parse_f64(token, line_no)?;
                if found < plane {
                    let point = &mut grid[level * plane + found];
                    match row_type {
                        -1 => point.wind_u = value,
                        -2 => point.wind_v = value,
                        _ => point.altitude = value,
                    }
                }
                found += 1;
            }
            if found != plane {
                return Err(FormatError::ValueCount { row: row_count + 1, found, expected: plane });
            }

            row_count += 1;
            if row_count % 3 == 0 && !seen.iter().all(|&s| s) {
                return Err(FormatError::IncompleteLevel { level });
            }
        }

        if row_count == 0 {
            return Err(FormatError::EmptyBody);
        }
        if row_count % 3 != 0 {
            return Err(FormatError::IncompleteLevel { level: row_count / 3 });
        }

        Ok(Self {
            tile,
            valid_from,
            radius_of_earth,
            resolution: config.resolution,
            points_per_side: points,
            level_count: row_count / 3,
            grid,
        })
    }

    /// Build a snapshot from an already-materialized grid.
    ///
    /// The grid must be level major, `points_per_side^2 * level_count` long,
    /// with index 0 the tile's southwest corner.
    ///
    /// # Errors
    /// Returns [`FormatError::GridLength`] if the grid length does not match
    /// the stated dimensions, or [`FormatError::EmptyBody`] for a snapshot
    /// with no levels.
    pub fn from_parts(
        tile: TileCoords,
        valid_from: i64,
        radius_of_earth: f64,
        resolution: f64,
        points_per_side: usize,
        level_count: usize,
        grid: Vec<WindGridPoint>,
    ) -> Result<Self, FormatError> {
        if level_count == 0 {
            return Err(FormatError::EmptyBody);
        }
        // a single row or column of nodes cannot bound an interpolation cell
        if points_per_side < 2 {
            return Err(FormatError::GridSize {
                u_size: points_per_side,
                v_size: points_per_side,
                expected: 2,
            });
        }
        let expected = points_per_side * points_per_side * level_count;
        if grid.len() != expected {
            return Err(FormatError::GridLength { found: grid.len(), expected });
        }
        Ok(Self {
            tile,
            valid_from,
            radius_of_earth,
            resolution,
            points_per_side,
            level_count,
            grid,
        })
    }

    /// Southwest corner of the tile this snapshot covers.
    #[must_use]
    pub fn tile(&self) -> TileCoords {
        self.tile
    }

    /// Unix timestamp this snapshot is valid from.
    #[must_use]
    pub fn valid_from(&self) -> i64 {
        self.valid_from
    }

    /// Spherical earth radius the dataset was computed against (m).
    #[must_use]
    pub fn radius_of_earth(&self) -> f64 {
        self.radius_of_earth
    }

    /// Grid spacing in degrees.
    #[must_use]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Grid points along one tile side.
    #[must_use]
    pub fn points_per_side(&self) -> usize {
        self.points_per_side
    }

    /// Number of pressure levels in this snapshot.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.level_count
    }

    /// Whether the point lies inside (or on the edge of) the covered tile.
    #[must_use]
    pub fn covers(&self, latitude: f64, longitude: f64) -> bool {
        let span = self.resolution * (self.points_per_side - 1) as f64;
        let lat_min = f64::from(self.tile.lat);
        let lng_min = f64::from(self.tile.lng);
        latitude >= lat_min
            && latitude <= lat_min + span
            && longitude >= lng_min
            && longitude <= lng_min + span
    }

    #[inline]
    fn index(&self, lat_index: usize, lng_index: usize, level: usize) -> usize {
        (level * self.points_per_side + lat_index) * self.points_per_side + lng_index
    }

    /// Grid node at the given tile-local indices.
    ///
    /// Index 0 is the southwest corner; latitude index grows northward.
    /// Indices out of range are a caller bug and panic.
    #[must_use]
    pub fn point(&self, lat_index: usize, lng_index: usize, level: usize) -> &WindGridPoint {
        &self.grid[self.index(lat_index, lng_index, level)]
    }
}

fn parse_f64(token: &str, line: usize) -> Result<f64, FormatError> {
    token
        .parse()
        .map_err(|_| FormatError::Parse { line, token: token.to_string() })
}

fn parse_i64(token: &str, line: usize) -> Result<i64, FormatError> {
    token
        .parse()
        .map_err(|_| FormatError::Parse { line, token: token.to_string() })
}

fn parse_usize(token: &str, line: usize) -> Result<usize, FormatError> {
    token
        .parse()
        .map_err(|_| FormatError::Parse { line, token: token.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: TileCoords = TileCoords { lat: 48, lng: 0 };

    /// Tile file text with `value = base + grid index` for each component,
    /// so every node is distinguishable.
    fn tile_text(tile: TileCoords, valid_from: i64, levels: usize) -> String {
        let config = WindGridConfig::default();
        let points = config.points_per_side();
        let mut text = format!(
            "6371229.0,{points},{points},{},{},{},{},{valid_from}\n",
            tile.lat,
            tile.lng,
            f64::from(tile.lat) + config.tile_size,
            f64::from(tile.lng) + config.tile_size,
        );
        for level in 0..levels {
            let planes = [(-1, 1000.0), (-2, 2000.0), (-3, 10_000.0 * (level + 1) as f64)];
            for (row_type, base) in planes {
                let pressure = 1000 - 50 * level;
                let values: Vec<String> = (0..points * points)
                    .map(|i| format!("{}", base + i as f64))
                    .collect();
                text.push_str(&format!("{row_type}, {pressure}, {}\n", values.join(", ")));
            }
        }
        text
    }

    #[test]
    fn test_parse_well_formed_tile() {
        let config = WindGridConfig::default();
        let text = tile_text(TILE, 1_262_304_000, 2);
        let snapshot = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap();

        assert_eq!(snapshot.tile(), TILE);
        assert_eq!(snapshot.valid_from(), 1_262_304_000);
        assert_eq!(snapshot.radius_of_earth(), 6_371_229.0);
        assert_eq!(snapshot.points_per_side(), 13);
        assert_eq!(snapshot.level_count(), 2);

        // Index 0 is the southwest corner
        let sw = snapshot.point(0, 0, 0);
        assert_eq!(sw.wind_u, 1000.0);
        assert_eq!(sw.wind_v, 2000.0);
        assert_eq!(sw.altitude, 10_000.0);

        // Row-major latitude-major ordering: one step north is one full row
        let north = snapshot.point(1, 0, 0);
        assert_eq!(north.wind_u, 1013.0);
        let east = snapshot.point(0, 1, 0);
        assert_eq!(east.wind_u, 1001.0);

        // Second level carries its own altitude plane
        assert_eq!(snapshot.point(0, 0, 1).altitude, 20_000.0);
    }

    #[test]
    fn test_reject_wrong_header_field_count() {
        let config = WindGridConfig::default();
        let text = "6371229.0,13,13,48,0,54,6\n";
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert_eq!(err, FormatError::HeaderFieldCount { found: 7 });
    }

    #[test]
    fn test_reject_wrong_grid_size() {
        let config = WindGridConfig::default();
        let text = "6371229.0,10,13,48,0,54,6,1262304000\n";
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert_eq!(err, FormatError::GridSize { u_size: 10, v_size: 13, expected: 13 });
    }

    #[test]
    fn test_reject_wrong_resolution() {
        let config = WindGridConfig::default();
        // Bounds span 12 degrees instead of 6: resolution appears to be 1.0
        let text = "6371229.0,13,13,48,0,60,12,1262304000\n";
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert_eq!(err, FormatError::Resolution { found: 1.0, expected: 0.5 });
    }

    #[test]
    fn test_reject_tile_mismatch() {
        let config = WindGridConfig::default();
        let text = tile_text(TileCoords { lat: 54, lng: 0 }, 1_262_304_000, 1);
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert!(matches!(err, FormatError::TileMismatch { file_lat, .. } if file_lat == 54.0));
    }

    #[test]
    fn test_reject_unknown_row_type() {
        let config = WindGridConfig::default();
        let mut text = tile_text(TILE, 1_262_304_000, 1);
        text.push_str("-4, 900, 0\n");
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert_eq!(err, FormatError::UnknownRowType { row: 4, row_type: -4 });
    }

    #[test]
    fn test_reject_wrong_value_count() {
        let config = WindGridConfig::default();
        let header = "6371229.0,13,13,48,0,54,6,1262304000\n";
        let text = format!("{header}-1, 1000, 1.0, 2.0, 3.0\n");
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert_eq!(err, FormatError::ValueCount { row: 1, found: 3, expected: 169 });
    }

    #[test]
    fn test_reject_incomplete_level() {
        let config = WindGridConfig::default();
        let full = tile_text(TILE, 1_262_304_000, 1);
        // Drop the last row of the only level
        let truncated: String = full
            .lines()
            .take(3)
            .map(|l| format!("{l}\n"))
            .collect();
        let err = WindSnapshot::parse(truncated.as_bytes(), &config, TILE).unwrap_err();
        assert_eq!(err, FormatError::IncompleteLevel { level: 0 });
    }

    #[test]
    fn test_reject_duplicate_component_in_level() {
        let config = WindGridConfig::default();
        let full = tile_text(TILE, 1_262_304_000, 1);
        let mut lines: Vec<&str> = full.lines().collect();
        // Replace the wind_v row's type marker, leaving two wind_u rows
        let duplicate = lines[2].replacen("-2", "-1", 1);
        lines[2] = &duplicate;
        let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert_eq!(err, FormatError::IncompleteLevel { level: 0 });
    }

    #[test]
    fn test_reject_empty_body() {
        let config = WindGridConfig::default();
        let text = "6371229.0,13,13,48,0,54,6,1262304000\n";
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert_eq!(err, FormatError::EmptyBody);
    }

    #[test]
    fn test_reject_unparsable_number() {
        let config = WindGridConfig::default();
        let text = "6371229.0,13,13,48,zero,54,6,1262304000\n";
        let err = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap_err();
        assert!(matches!(err, FormatError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_covers_is_edge_inclusive() {
        let config = WindGridConfig::default();
        let text = tile_text(TILE, 1_262_304_000, 1);
        let snapshot = WindSnapshot::parse(text.as_bytes(), &config, TILE).unwrap();

        assert!(snapshot.covers(48.0, 0.0));
        assert!(snapshot.covers(54.0, 6.0));
        assert!(snapshot.covers(51.0, 3.0));
        assert!(!snapshot.covers(47.999, 3.0));
        assert!(!snapshot.covers(51.0, 6.001));
    }

    #[test]
    fn test_from_parts_checks_grid_length() {
        let err = WindSnapshot::from_parts(TILE, 0, 6_371_229.0, 0.5, 13, 2, vec![]).unwrap_err();
        assert_eq!(err, FormatError::GridLength { found: 0, expected: 338 });
    }

    #[test]
    fn test_config_validation() {
        assert!(WindGridConfig::default().validate().is_ok());

        let bad = WindGridConfig { resolution: 0.7, ..Default::default() };
        assert!(matches!(bad.validate(), Err(ConfigError::OutOfRange { .. })));

        let bad = WindGridConfig { time_period: 0, ..Default::default() };
        assert!(matches!(bad.validate(), Err(ConfigError::NonPositive { .. })));
    }
}
