//! Per-particle wind sampling strategies.
//!
//! The interpolated wind is a mean estimate. The default strategy flies the
//! particle on that mean; the Gaussian strategy draws the particle's wind
//! from a normal distribution around it, turning the ensemble into a Monte
//! Carlo sample of the landing distribution, and reports each draw's log
//! density so particles can be weighted afterwards.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::core_types::WindVector;
use crate::error::SimulationError;
use crate::wind::WindSample;

/// How a particle turns an interpolated wind into the velocity it flies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindSampling {
    /// Fly the interpolated mean. Log-likelihoods stay at zero.
    #[default]
    DeterministicMean,
    /// Perturb each component by `Normal(0, sigma)` where `sigma^2` is the
    /// dataset variance plus the squared RMS wind error.
    Gaussian,
}

impl WindSampling {
    /// Apply the strategy to one interpolated wind.
    ///
    /// Returns the velocity the particle flies this timestep and the log
    /// density of the perturbation draw, zero for the deterministic strategy
    /// and for a zero total variance.
    ///
    /// # Errors
    /// Returns [`SimulationError::NegativeVariance`] when the combined
    /// variance is negative or NaN.
    pub fn apply<R: Rng + ?Sized>(
        self,
        sample: &WindSample,
        rms_wind_error: f64,
        rng: &mut R,
    ) -> Result<(WindVector, f64), SimulationError> {
        match self {
            WindSampling::DeterministicMean => Ok((WindVector::new(sample.u, sample.v), 0.0)),
            WindSampling::Gaussian => {
                let variance = sample.variance.unwrap_or(0.0) + rms_wind_error * rms_wind_error;
                if variance < 0.0 || variance.is_nan() {
                    return Err(SimulationError::NegativeVariance { variance });
                }
                if variance == 0.0 {
                    return Ok((WindVector::new(sample.u, sample.v), 0.0));
                }
                let normal = Normal::new(0.0, variance.sqrt())
                    .map_err(|e| SimulationError::Sampling(e.to_string()))?;
                let du = normal.sample(rng);
                let dv = normal.sample(rng);
                let log_density =
                    log_normal_density(du, variance) + log_normal_density(dv, variance);
                Ok((WindVector::new(sample.u + du, sample.v + dv), log_density))
            }
        }
    }
}

/// Log density of a zero-mean normal draw with the given variance.
fn log_normal_density(x: f64, variance: f64) -> f64 {
    -0.5 * (std::f64::consts::TAU * variance).ln() - x * x / (2.0 * variance)
}
