//! Geographic position primitives.
//!
//! Latitude and longitude are in degrees, altitude in metres above sea level.
//! The wind dataset assumes a spherical earth (the radius comes from each
//! tile file header), so all metre/degree conversions here are spherical too.

use serde::{Deserialize, Serialize};

/// Latitudes closer to a pole than this are clamped before the longitude
/// scale factor is computed, keeping `1/cos(lat)` finite.
pub const POLE_CLAMP_DEGREES: f64 = 89.9;

/// A geographic point, used for launch sites and landing estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east, normalised into (-180, 180].
    pub longitude: f64,
    /// Altitude in metres above sea level.
    pub altitude: f64,
}

impl GeoPosition {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude: normalise_longitude(longitude),
            altitude,
        }
    }
}

/// Wrap a longitude into the range (-180, 180].
///
/// Values that drift past the antimeridian during integration come back in
/// from the other side; -180 itself maps to +180 so the range has a single
/// representation for the antimeridian.
#[must_use]
pub fn normalise_longitude(mut longitude: f64) -> f64 {
    if !longitude.is_finite() {
        return longitude;
    }
    while longitude > 180.0 {
        longitude -= 360.0;
    }
    while longitude <= -180.0 {
        longitude += 360.0;
    }
    longitude
}

/// Coordinates of one wind tile: the latitude/longitude of its southwest
/// corner, always a multiple of the tile size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoords {
    /// Southwest corner latitude in whole degrees.
    pub lat: i32,
    /// Southwest corner longitude in whole degrees.
    pub lng: i32,
}

impl TileCoords {
    /// Tile containing the given point.
    ///
    /// Coordinates are floored to the nearest multiple of `tile_size`, so a
    /// point exactly on a tile boundary belongs to the tile whose southwest
    /// corner it touches. Flooring is a true floor: `lat = -0.5` with a 6
    /// degree tile size gives tile latitude -6, not 0.
    #[must_use]
    pub fn containing(latitude: f64, longitude: f64, tile_size: f64) -> Self {
        Self {
            lat: ((latitude / tile_size).floor() * tile_size) as i32,
            lng: ((longitude / tile_size).floor() * tile_size) as i32,
        }
    }
}

impl std::fmt::Display for TileCoords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

/// Metres spanned by one degree of latitude at the given altitude.
///
/// On a sphere this is independent of position: the full meridian circle at
/// radius `R + alt` divided by 360.
#[must_use]
pub fn metres_per_degree_latitude(radius_of_earth: f64, altitude: f64) -> f64 {
    2.0 * std::f64::consts::PI * (radius_of_earth + altitude) / 360.0
}

/// Metres spanned by one degree of longitude at the given latitude and
/// altitude.
///
/// Parallels shrink by the cosine of latitude. The latitude is clamped away
/// from the poles so the factor stays finite; a balloon drifting that far
/// poleward is outside the dataset's coverage anyway.
#[must_use]
pub fn metres_per_degree_longitude(radius_of_earth: f64, altitude: f64, latitude: f64) -> f64 {
    let clamped = latitude.clamp(-POLE_CLAMP_DEGREES, POLE_CLAMP_DEGREES);
    metres_per_degree_latitude(radius_of_earth, altitude) * clamped.to_radians().cos().abs()
}
