//! Altitude-vs-time flight profile.
//!
//! A balloon flight is modelled as linear ascent at a constant rate up to the
//! burst altitude, then terminal-velocity descent through the stratified
//! atmosphere of [`crate::atmosphere`]. Descent-only flights (after burst or
//! cutdown) skip straight to the descent branch.
//!
//! Descent assumes the payload is at terminal velocity at every instant:
//! `v = -drag_coeff / sqrt(density(altitude))`, recomputed each step as the
//! air thins or thickens. Convergence to terminal velocity takes well under a
//! minute even for low-drag payloads, so the transient after burst is
//! ignored.

use crate::atmosphere::density;
use crate::error::ConfigError;

/// Integration step of the whole simulation, in seconds.
pub const TIMESTEP_SECONDS: i64 = 1;

/// Converts a sea-level descent rate (m/s) into a drag coefficient.
///
/// The descent model computes `v = drag_coeff / sqrt(density)`, so a payload
/// that falls at `r` m/s through sea-level air (1.22 kg/m^3) has
/// `drag_coeff = r * sqrt(1.22) = r * 1.1045`.
pub const SEA_LEVEL_DRAG_FACTOR: f64 = 1.1045;

/// Immutable flight profile parameters for one run.
#[derive(Debug, Clone, Copy)]
pub struct FlightParameters {
    descent_mode: bool,
    burst_altitude: f64,
    ascent_rate: f64,
    drag_coeff: f64,
}

/// Derived altitude-model state, computed once at mission time zero.
///
/// One instance per simulation run, owned by the caller and passed by
/// reference into every [`FlightParameters::step`] call. Keeping it a plain
/// value rather than hidden model state lets several runs, and several
/// particles of one run, proceed independently in one process.
#[derive(Debug, Clone, Copy)]
pub struct AltitudeModelState {
    initial_altitude: f64,
    burst_time: f64,
}

impl AltitudeModelState {
    /// Altitude observed at mission time zero, in metres.
    #[must_use]
    pub fn initial_altitude(&self) -> f64 {
        self.initial_altitude
    }

    /// Seconds after launch at which the envelope bursts.
    ///
    /// Zero for descent-only flights.
    #[must_use]
    pub fn burst_time(&self) -> f64 {
        self.burst_time
    }
}

impl FlightParameters {
    /// Profile for a full ascent-burst-descent flight.
    ///
    /// # Errors
    /// Returns [`ConfigError::NonPositive`] if any parameter is zero,
    /// negative, or not a number.
    pub fn ascending(
        burst_altitude: f64,
        ascent_rate: f64,
        drag_coeff: f64,
    ) -> Result<Self, ConfigError> {
        require_positive("burst_altitude", burst_altitude)?;
        require_positive("ascent_rate", ascent_rate)?;
        require_positive("drag_coeff", drag_coeff)?;
        Ok(Self {
            descent_mode: false,
            burst_altitude,
            ascent_rate,
            drag_coeff,
        })
    }

    /// Profile for a flight already in its descent phase.
    ///
    /// Burst altitude and ascent rate are irrelevant and ignored.
    ///
    /// # Errors
    /// Returns [`ConfigError::NonPositive`] if the drag coefficient is zero,
    /// negative, or not a number.
    pub fn descending(drag_coeff: f64) -> Result<Self, ConfigError> {
        require_positive("drag_coeff", drag_coeff)?;
        Ok(Self {
            descent_mode: true,
            burst_altitude: 0.0,
            ascent_rate: 0.0,
            drag_coeff,
        })
    }

    /// Drag coefficient for a payload with the given sea-level descent rate.
    #[must_use]
    pub fn drag_from_descent_rate(descent_rate: f64) -> f64 {
        descent_rate * SEA_LEVEL_DRAG_FACTOR
    }

    /// Whether this profile starts in the descent phase.
    #[must_use]
    pub fn is_descent_mode(&self) -> bool {
        self.descent_mode
    }

    /// Derive the altitude-model state from the altitude observed at mission
    /// time zero.
    #[must_use]
    pub fn init_state(&self, initial_altitude: f64) -> AltitudeModelState {
        let burst_time = if self.descent_mode {
            0.0
        } else {
            (self.burst_altitude - initial_altitude) / self.ascent_rate
        };
        AltitudeModelState {
            initial_altitude,
            burst_time,
        }
    }

    /// Advance the altitude by one timestep at the given mission time.
    ///
    /// Before burst the altitude is set directly from the linear ascent
    /// profile; after burst (or always, in descent mode) one explicit Euler
    /// step of terminal-velocity descent is integrated. Returns `false` once
    /// the payload has reached the ground (altitude <= 0); the caller is
    /// responsible for acting on that.
    pub fn step(
        &self,
        state: &AltitudeModelState,
        elapsed_seconds: f64,
        altitude: &mut f64,
    ) -> bool {
        if !self.descent_mode && elapsed_seconds <= state.burst_time {
            *altitude = state.initial_altitude + elapsed_seconds * self.ascent_rate;
            return true;
        }

        let dt = TIMESTEP_SECONDS as f64;
        *altitude += dt * (-self.drag_coeff / density(*altitude).sqrt());

        *altitude > 0.0
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}
