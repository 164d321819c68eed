//! Wind interpolation between a resident snapshot pair.
//!
//! A lookup is quadrilinear: bilinear across the four grid nodes enclosing
//! the point, linear between the past and future snapshots, and linear
//! between the two pressure levels bracketing the altitude. Pressure levels
//! are height surfaces rather than fixed altitudes, so the bracket is found
//! against each level's altitude interpolated to the query point and time
//! first; winds are then blended between the bracketing levels only.
//!
//! A query above the top level or below the bottom one collapses the bracket
//! to the nearest level and holds its wind constant instead of extrapolating.

use tracing::warn;

use crate::error::{DataError, FormatError};
use crate::wind::snapshot::{WindGridPoint, WindSnapshot};

/// Interpolated wind at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    /// Zonal component in m/s, positive eastward.
    pub u: f64,
    /// Meridional component in m/s, positive northward.
    pub v: f64,
    /// Wind variance in m^2/s^2, `None` for datasets that carry no
    /// uncertainty estimate.
    pub variance: Option<f64>,
}

/// Grid cell containing a point, with the fractional position inside it.
#[derive(Debug, Clone, Copy)]
struct CellIndex {
    lat_index: usize,
    lng_index: usize,
    lat_frac: f64,
    lng_frac: f64,
}

impl CellIndex {
    /// Locate the cell for a point the snapshot covers.
    ///
    /// A point on the tile's north or east edge maps into the last cell with
    /// fraction 1, keeping the edge nodes addressable.
    fn locate(snapshot: &WindSnapshot, latitude: f64, longitude: f64) -> Self {
        let resolution = snapshot.resolution();
        let last_cell = snapshot.points_per_side() - 2;
        let lat_offset = latitude - f64::from(snapshot.tile().lat);
        let lng_offset = longitude - f64::from(snapshot.tile().lng);
        let lat_index = ((lat_offset / resolution) as usize).min(last_cell);
        let lng_index = ((lng_offset / resolution) as usize).min(last_cell);
        Self {
            lat_index,
            lng_index,
            lat_frac: (lat_offset - lat_index as f64 * resolution) / resolution,
            lng_frac: (lng_offset - lng_index as f64 * resolution) / resolution,
        }
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    (1.0 - t) * a + t * b
}

/// Bilinear interpolation of one field over the cell's four corner nodes.
fn bilinear(
    snapshot: &WindSnapshot,
    cell: CellIndex,
    level: usize,
    field: impl Fn(&WindGridPoint) -> f64,
) -> f64 {
    let CellIndex { lat_index, lng_index, lat_frac, lng_frac } = cell;
    let at_lng0 = lerp(
        field(snapshot.point(lat_index, lng_index, level)),
        field(snapshot.point(lat_index + 1, lng_index, level)),
        lat_frac,
    );
    let at_lng1 = lerp(
        field(snapshot.point(lat_index, lng_index + 1, level)),
        field(snapshot.point(lat_index + 1, lng_index + 1, level)),
        lat_frac,
    );
    lerp(at_lng0, at_lng1, lng_frac)
}

/// One field interpolated in space on both snapshots, then blended in time.
fn blended(
    past: &WindSnapshot,
    future: &WindSnapshot,
    past_cell: CellIndex,
    future_cell: CellIndex,
    level: usize,
    time_frac: f64,
    field: impl Fn(&WindGridPoint) -> f64 + Copy,
) -> f64 {
    lerp(
        bilinear(past, past_cell, level, field),
        bilinear(future, future_cell, level, field),
        time_frac,
    )
}

/// Interpolate the wind at a point, altitude, and time from a snapshot pair.
///
/// `past` and `future` are consecutive snapshots of the tile containing the
/// point. A timestamp at either snapshot boundary weights that snapshot
/// fully.
///
/// # Errors
/// Returns a [`DataError`] if either snapshot does not cover the point or
/// the pair disagrees on the number of pressure levels.
pub fn sample(
    past: &WindSnapshot,
    future: &WindSnapshot,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    timestamp: i64,
) -> Result<WindSample, DataError> {
    for snapshot in [past, future] {
        if !snapshot.covers(latitude, longitude) {
            return Err(DataError::PointOutsideTile {
                latitude,
                longitude,
                tile: snapshot.tile(),
            });
        }
    }
    let levels = past.level_count();
    if levels != future.level_count() {
        return Err(DataError::LevelMismatch { past: levels, future: future.level_count() });
    }

    let past_cell = CellIndex::locate(past, latitude, longitude);
    let future_cell = CellIndex::locate(future, latitude, longitude);

    let span = (future.valid_from() - past.valid_from()) as f64;
    let time_frac = if span == 0.0 {
        warn!("snapshot pair shares one timestamp, blending both equally");
        0.5
    } else {
        (timestamp - past.valid_from()) as f64 / span
    };

    // Closest level strictly below the query altitude and closest level at
    // or above it, judged by time-blended level altitudes.
    let mut below: Option<(usize, f64)> = None;
    let mut above: Option<(usize, f64)> = None;
    for level in 0..levels {
        let level_altitude =
            blended(past, future, past_cell, future_cell, level, time_frac, |p| p.altitude);
        if level_altitude < altitude {
            let diff = altitude - level_altitude;
            if below.is_none_or(|(_, best)| diff < best) {
                below = Some((level, diff));
            }
        } else {
            let diff = level_altitude - altitude;
            if above.is_none_or(|(_, best)| diff < best) {
                above = Some((level, diff));
            }
        }
    }

    // Outside the covered altitude range the nearest level serves both sides
    // of the bracket and its wind is held constant.
    let (below, below_diff, above, above_diff) = match (below, above) {
        (Some((b, bd)), Some((a, ad))) => (b, bd, a, ad),
        (Some((b, bd)), None) => (b, bd, b, 0.0),
        (None, Some((a, ad))) => (a, 0.0, a, ad),
        // snapshots always carry at least one level
        (None, None) => return Err(DataError::Format(FormatError::EmptyBody)),
    };

    let spread = below_diff + above_diff;
    let level_frac = if spread > 0.0 { below_diff / spread } else { 0.0 };

    let u = lerp(
        blended(past, future, past_cell, future_cell, below, time_frac, |p| p.wind_u),
        blended(past, future, past_cell, future_cell, above, time_frac, |p| p.wind_u),
        level_frac,
    );
    let v = lerp(
        blended(past, future, past_cell, future_cell, below, time_frac, |p| p.wind_v),
        blended(past, future, past_cell, future_cell, above, time_frac, |p| p.wind_v),
        level_frac,
    );

    Ok(WindSample { u, v, variance: None })
}
