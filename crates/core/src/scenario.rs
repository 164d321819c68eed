//! Run scenario (de)serialization.
//!
//! A scenario file bundles the launch site, flight profile, and ensemble
//! options as JSON, so repeated runs don't need long command lines.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::altitude::FlightParameters;
use crate::ensemble::{EnsembleConfig, LaunchSite};
use crate::error::ConfigError;

/// Declarative flight profile, as it appears in a scenario file.
///
/// Exactly one of `drag_coeff` and `descent_rate` must be given; the
/// descent-rate form is the sea-level rate in m/s and is converted to a
/// drag coefficient internally.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightProfile {
    /// Start in the descent phase, ignoring burst altitude and ascent rate.
    pub descending: bool,
    /// Burst altitude in metres, required for ascending flights.
    pub burst_altitude: Option<f64>,
    /// Ascent rate in m/s, required for ascending flights.
    pub ascent_rate: Option<f64>,
    /// Drag coefficient of the descending payload.
    pub drag_coeff: Option<f64>,
    /// Sea-level descent rate in m/s, alternative to `drag_coeff`.
    pub descent_rate: Option<f64>,
}

impl FlightProfile {
    /// Resolve the profile into validated flight parameters.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when both or neither drag form is given,
    /// an ascending profile is missing its burst altitude or ascent rate,
    /// or a value is not positive.
    pub fn to_parameters(&self) -> Result<FlightParameters, ConfigError> {
        let drag_coeff = match (self.drag_coeff, self.descent_rate) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflicting {
                    first: "drag_coeff",
                    second: "descent_rate",
                });
            }
            (Some(drag), None) => drag,
            (None, Some(rate)) => {
                if rate.is_nan() || rate <= 0.0 {
                    return Err(ConfigError::NonPositive { name: "descent_rate", value: rate });
                }
                FlightParameters::drag_from_descent_rate(rate)
            }
            (None, None) => return Err(ConfigError::Missing { field: "drag_coeff" }),
        };

        if self.descending {
            FlightParameters::descending(drag_coeff)
        } else {
            let burst_altitude = self
                .burst_altitude
                .ok_or(ConfigError::Missing { field: "burst_altitude" })?;
            let ascent_rate =
                self.ascent_rate.ok_or(ConfigError::Missing { field: "ascent_rate" })?;
            FlightParameters::ascending(burst_altitude, ascent_rate, drag_coeff)
        }
    }
}

/// A complete run description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub launch: LaunchSite,
    pub flight: FlightProfile,
    /// Ensemble options; defaults apply when omitted from the file.
    #[serde(default)]
    pub ensemble: EnsembleConfig,
}

impl Scenario {
    /// Load a scenario from a JSON file.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadFailed`] if the file cannot be read and
    /// [`ConfigError::ParseFailed`] if it does not hold a valid scenario.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        let scenario: Self =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;

        Ok(scenario)
    }

    /// Save the scenario as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`ConfigError::SerializeFailed`] if encoding fails and
    /// [`ConfigError::SaveFailed`] if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeFailed(e.to_string()))?;

        fs::write(path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::WindSampling;

    fn sample_scenario() -> Scenario {
        Scenario {
            launch: LaunchSite {
                latitude: 52.2135,
                longitude: 0.0964,
                altitude: 0.0,
                timestamp: 1_234_567_890,
            },
            flight: FlightProfile {
                descending: false,
                burst_altitude: Some(30_000.0),
                ascent_rate: Some(5.0),
                drag_coeff: None,
                descent_rate: Some(20.0),
            },
            ensemble: EnsembleConfig {
                particle_count: 50,
                sampling: WindSampling::Gaussian,
                rms_wind_error: 2.0,
                ..EnsembleConfig::default()
            },
        }
    }

    #[test]
    fn test_scenario_round_trips_through_json() {
        let path = "/tmp/balloon_pred_scenario_roundtrip.json";
        let scenario = sample_scenario();

        scenario.save(path).unwrap();
        let loaded = Scenario::load(path).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(loaded, scenario);
    }

    #[test]
    fn test_minimal_scenario_fills_ensemble_defaults() {
        let json = r#"{
            "launch": { "latitude": 52.0, "longitude": 0.1, "altitude": 0.0, "timestamp": 0 },
            "flight": { "descending": true, "descent_rate": 20.0 }
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();

        assert!(scenario.flight.descending);
        assert_eq!(scenario.ensemble, EnsembleConfig::default());
        assert_eq!(scenario.ensemble.particle_count, 300);
    }

    #[test]
    fn test_profile_resolves_descent_rate_to_drag() {
        let profile = FlightProfile {
            descending: true,
            descent_rate: Some(20.0),
            ..FlightProfile::default()
        };
        let parameters = profile.to_parameters().unwrap();
        assert!(parameters.is_descent_mode());
    }

    #[test]
    fn test_profile_rejects_both_drag_forms() {
        let profile = FlightProfile {
            descending: true,
            drag_coeff: Some(22.09),
            descent_rate: Some(20.0),
            ..FlightProfile::default()
        };
        assert_eq!(
            profile.to_parameters().unwrap_err(),
            ConfigError::Conflicting { first: "drag_coeff", second: "descent_rate" }
        );
    }

    #[test]
    fn test_profile_requires_some_drag_form() {
        let profile = FlightProfile { descending: true, ..FlightProfile::default() };
        assert_eq!(
            profile.to_parameters().unwrap_err(),
            ConfigError::Missing { field: "drag_coeff" }
        );
    }

    #[test]
    fn test_ascending_profile_requires_burst_and_rate() {
        let profile = FlightProfile {
            drag_coeff: Some(22.09),
            ascent_rate: Some(5.0),
            ..FlightProfile::default()
        };
        assert_eq!(
            profile.to_parameters().unwrap_err(),
            ConfigError::Missing { field: "burst_altitude" }
        );
    }

    #[test]
    fn test_negative_descent_rate_is_rejected() {
        let profile = FlightProfile {
            descending: true,
            descent_rate: Some(-3.0),
            ..FlightProfile::default()
        };
        assert_eq!(
            profile.to_parameters().unwrap_err(),
            ConfigError::NonPositive { name: "descent_rate", value: -3.0 }
        );
    }

    #[test]
    fn test_load_reports_missing_file_and_bad_json_separately() {
        let missing = Scenario::load("/tmp/balloon_pred_scenario_does_not_exist.json");
        assert!(matches!(missing.unwrap_err(), ConfigError::LoadFailed(_)));

        let path = "/tmp/balloon_pred_scenario_invalid.json";
        std::fs::write(path, "{ not json").unwrap();
        let invalid = Scenario::load(path);
        std::fs::remove_file(path).unwrap();
        assert!(matches!(invalid.unwrap_err(), ConfigError::ParseFailed(_)));
    }
}
