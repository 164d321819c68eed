//! Vector type alias for horizontal wind velocities.

use nalgebra::Vector2;

/// Horizontal wind velocity in metres per second.
///
/// This is a simple alias for `nalgebra::Vector2<f64>`. The `x` component is
/// the zonal wind `u` (positive eastward) and the `y` component is the
/// meridional wind `v` (positive northward), matching the GFS convention the
/// decoded wind tiles use.
pub type WindVector = Vector2<f64>;
