//! Ensemble trajectory integration.
//!
//! Runs N independent particles through a shared altitude profile and wind
//! field, one simulated second at a time. All particles advance before
//! simulated time does: within a timestep every particle reads the same
//! resident snapshot pair and mutates only its own state, so the
//! per-timestep fan-out across rayon workers is safe, and the join before
//! the next timestep is the barrier that keeps the window-advance logic
//! single threaded. The only blocking I/O in a run is the snapshot load at
//! a window boundary.

pub mod sampling;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::altitude::{AltitudeModelState, FlightParameters, TIMESTEP_SECONDS};
use crate::core_types::{
    metres_per_degree_latitude, metres_per_degree_longitude, normalise_longitude, GeoPosition,
};
use crate::error::{ConfigError, PredictionError};
use crate::output::PositionWriter;
use crate::wind::{sample, TileCache, TileStore, WindSnapshot};

pub use sampling::WindSampling;

/// Ensemble run parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Number of independent particles.
    pub particle_count: usize,
    /// RMS wind error in m/s, added in quadrature to the dataset variance
    /// by the Gaussian sampling strategy.
    pub rms_wind_error: f64,
    /// Steps between position samples of the representative particle.
    pub log_decimate: u32,
    /// Altitude in metres below which a post-burst particle counts as
    /// landed.
    pub landed_epsilon: f64,
    /// Maximum number of wind windows one run may consume.
    pub max_window_retries: u32,
    /// How particles turn interpolated wind into motion.
    pub sampling: WindSampling,
    /// Base RNG seed; particle `i` draws from `seed + i`.
    pub seed: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            particle_count: 300,
            rms_wind_error: 0.0,
            log_decimate: 50,
            landed_epsilon: 10.0,
            max_window_retries: 5,
            sampling: WindSampling::default(),
            seed: 0,
        }
    }
}

impl EnsembleConfig {
    /// Check the configuration is runnable.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] naming the offending parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particle_count == 0 {
            return Err(ConfigError::NonPositive { name: "particle_count", value: 0.0 });
        }
        if self.rms_wind_error.is_nan() || self.rms_wind_error < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "rms_wind_error",
                value: self.rms_wind_error,
            });
        }
        if self.log_decimate == 0 {
            return Err(ConfigError::NonPositive { name: "log_decimate", value: 0.0 });
        }
        if self.landed_epsilon.is_nan() || self.landed_epsilon <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "landed_epsilon",
                value: self.landed_epsilon,
            });
        }
        if self.max_window_retries == 0 {
            return Err(ConfigError::NonPositive { name: "max_window_retries", value: 0.0 });
        }
        Ok(())
    }
}

/// Launch position and time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaunchSite {
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east; normalised into (-180, 180] at run start.
    pub longitude: f64,
    /// Metres above sea level.
    pub altitude: f64,
    /// Unix launch timestamp.
    pub timestamp: i64,
}

impl LaunchSite {
    /// Check the launch site is usable.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] naming the offending coordinate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::OutOfRange { name: "latitude", value: self.latitude });
        }
        if !self.longitude.is_finite() {
            return Err(ConfigError::OutOfRange { name: "longitude", value: self.longitude });
        }
        if self.altitude.is_nan() || self.altitude < 0.0 {
            return Err(ConfigError::OutOfRange { name: "altitude", value: self.altitude });
        }
        Ok(())
    }
}

/// One ensemble member's mutable state.
#[derive(Debug, Clone)]
struct ParticleState {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    log_likelihood: f64,
    landed: bool,
    rng: SmallRng,
}

impl ParticleState {
    fn at_launch(launch: &LaunchSite, seed: u64) -> Self {
        Self {
            latitude: launch.latitude,
            longitude: normalise_longitude(launch.longitude),
            altitude: launch.altitude,
            log_likelihood: 0.0,
            landed: false,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every particle reached the ground.
    Landed,
    /// The window budget ran out with particles still aloft.
    WindowBudgetExhausted,
}

/// Result of one ensemble run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Simulated seconds from launch to the last executed step.
    pub elapsed_seconds: i64,
    /// Wind windows consumed.
    pub windows_used: u32,
    /// Final position of every particle, in particle order.
    pub landing_points: Vec<GeoPosition>,
    /// Accumulated log density of each particle's wind draws, in particle
    /// order; all zero under the deterministic strategy.
    pub log_likelihoods: Vec<f64>,
}

impl RunSummary {
    /// Arithmetic mean of the landing points, `None` for an empty ensemble.
    ///
    /// A naive component mean; not meaningful for an ensemble straddling
    /// the antimeridian.
    #[must_use]
    pub fn mean_landing_point(&self) -> Option<GeoPosition> {
        if self.landing_points.is_empty() {
            return None;
        }
        let n = self.landing_points.len() as f64;
        let mut latitude = 0.0;
        let mut longitude = 0.0;
        let mut altitude = 0.0;
        for point in &self.landing_points {
            latitude += point.latitude;
            longitude += point.longitude;
            altitude += point.altitude;
        }
        Some(GeoPosition::new(latitude / n, longitude / n, altitude / n))
    }
}

/// Everything a particle needs for one timestep, shared across workers.
struct StepContext<'a> {
    flight: &'a FlightParameters,
    state: &'a AltitudeModelState,
    sampling: WindSampling,
    rms_wind_error: f64,
    landed_epsilon: f64,
    past: &'a WindSnapshot,
    future: &'a WindSnapshot,
    radius_of_earth: f64,
    elapsed_seconds: f64,
    timestamp: i64,
}

/// Advance one particle by one timestep.
fn step_particle(
    particle: &mut ParticleState,
    ctx: &StepContext<'_>,
) -> Result<(), PredictionError> {
    if particle.landed {
        return Ok(());
    }

    let aloft = ctx.flight.step(ctx.state, ctx.elapsed_seconds, &mut particle.altitude);
    if !aloft {
        particle.altitude = 0.0;
        particle.landed = true;
        return Ok(());
    }
    // The landed threshold only applies after burst; an ascending launch
    // starts below it
    if ctx.elapsed_seconds > ctx.state.burst_time() && particle.altitude < ctx.landed_epsilon {
        particle.landed = true;
        return Ok(());
    }

    let wind = sample(
        ctx.past,
        ctx.future,
        particle.latitude,
        particle.longitude,
        particle.altitude,
        ctx.timestamp,
    )?;
    let (velocity, log_density) =
        ctx.sampling.apply(&wind, ctx.rms_wind_error, &mut particle.rng)?;
    particle.log_likelihood += log_density;

    let dt = TIMESTEP_SECONDS as f64;
    particle.latitude +=
        velocity.y * dt / metres_per_degree_latitude(ctx.radius_of_earth, particle.altitude);
    // the longitude scale uses the already-updated latitude
    particle.longitude += velocity.x * dt
        / metres_per_degree_longitude(ctx.radius_of_earth, particle.altitude, particle.latitude);
    particle.longitude = normalise_longitude(particle.longitude);

    Ok(())
}

/// Drives an ensemble of particles from launch to landing.
#[derive(Debug)]
pub struct EnsembleIntegrator<S, W> {
    config: EnsembleConfig,
    flight: FlightParameters,
    cache: TileCache<S>,
    writer: W,
}

impl<S: TileStore, W: PositionWriter> EnsembleIntegrator<S, W> {
    /// Build an integrator over a validated configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for an unusable ensemble configuration.
    pub fn new(
        config: EnsembleConfig,
        flight: FlightParameters,
        cache: TileCache<S>,
        writer: W,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, flight, cache, writer })
    }

    /// Recover the writer, e.g. to inspect an in-memory trajectory.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Simulate the full flight of every particle from the launch site.
    ///
    /// Positions of particle 0 are emitted to the writer every
    /// `log_decimate` steps and once more at the end of the run, so the
    /// last sample is always the resting position. Running out of the
    /// window budget is not an error: it is reported through
    /// [`RunOutcome::WindowBudgetExhausted`] in the summary.
    ///
    /// # Errors
    /// Returns a [`PredictionError`] for an invalid launch site, any wind
    /// data failure, or a writer failure. All are fatal to the run.
    pub fn run(&mut self, launch: &LaunchSite) -> Result<RunSummary, PredictionError> {
        launch.validate()?;

        let state = self.flight.init_state(launch.altitude);
        let mut particles: Vec<ParticleState> = (0..self.config.particle_count)
            .map(|i| ParticleState::at_launch(launch, self.config.seed.wrapping_add(i as u64)))
            .collect();

        info!(
            particles = particles.len(),
            descent_mode = self.flight.is_descent_mode(),
            start = launch.timestamp,
            "starting ensemble run"
        );

        let mut timestamp = launch.timestamp;
        let mut last_step_time = launch.timestamp;
        let mut windows_used: u32 = 0;
        let mut log_counter: u32 = 0;
        let mut last_emitted: Option<i64> = None;

        let outcome = 'flight: loop {
            if windows_used == self.config.max_window_retries {
                warn!(windows = windows_used, "window budget exhausted, particles still aloft");
                break RunOutcome::WindowBudgetExhausted;
            }

            // Particle 0 is the representative: it picks the tile for the
            // whole ensemble, as in the single-trajectory model this
            // generalises. Particles that stray across the tile edge make
            // the sampler fail the run.
            let (rep_lat, rep_lng) = (particles[0].latitude, particles[0].longitude);
            let (past, future) = self.cache.acquire_window(rep_lat, rep_lng, timestamp)?;
            windows_used += 1;
            let window_end = future.valid_from();
            let radius_of_earth = past.snapshot().radius_of_earth();

            while timestamp <= window_end {
                let ctx = StepContext {
                    flight: &self.flight,
                    state: &state,
                    sampling: self.config.sampling,
                    rms_wind_error: self.config.rms_wind_error,
                    landed_epsilon: self.config.landed_epsilon,
                    past: past.snapshot(),
                    future: future.snapshot(),
                    radius_of_earth,
                    elapsed_seconds: (timestamp - launch.timestamp) as f64,
                    timestamp,
                };
                particles
                    .par_iter_mut()
                    .try_for_each(|particle| step_particle(particle, &ctx))?;

                if log_counter == self.config.log_decimate {
                    let lead = &particles[0];
                    self.writer.write_position(
                        lead.latitude,
                        lead.longitude,
                        lead.altitude,
                        timestamp,
                    )?;
                    last_emitted = Some(timestamp);
                    log_counter = 0;
                }
                log_counter += 1;
                last_step_time = timestamp;

                if particles.iter().all(|p| p.landed) {
                    break 'flight RunOutcome::Landed;
                }
                timestamp += TIMESTEP_SECONDS;
            }
        };

        // The resting position is always the last sample out, so the final
        // line of the output is the landing estimate
        if last_emitted != Some(last_step_time) {
            let lead = &particles[0];
            self.writer.write_position(
                lead.latitude,
                lead.longitude,
                lead.altitude,
                last_step_time,
            )?;
        }
        self.writer.finish()?;

        let landing_points = particles
            .iter()
            .map(|p| GeoPosition::new(p.latitude, p.longitude, p.altitude))
            .collect();
        let log_likelihoods = particles.iter().map(|p| p.log_likelihood).collect();
        let elapsed_seconds = last_step_time - launch.timestamp;

        info!(?outcome, elapsed_seconds, windows_used, "ensemble run complete");

        Ok(RunSummary { outcome, elapsed_seconds, windows_used, landing_points, log_likelihoods })
    }
}
