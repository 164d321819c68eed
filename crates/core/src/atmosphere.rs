//! Stratified atmospheric density model.
//!
//! Implements the NASA Glenn Research Center "Earth Atmosphere Model", a
//! three-segment fit to the standard atmosphere:
//!
//! - Troposphere (up to 11 km): temperature falls linearly, pressure follows
//!   a power law.
//! - Lower stratosphere (11 km to 25 km): temperature is constant at
//!   -56.46 degrees C, pressure decays exponentially.
//! - Upper stratosphere (above 25 km): temperature rises linearly, pressure
//!   follows a power law.
//!
//! Units follow the published model: altitude in metres, temperature in
//! degrees Celsius, pressure in kilopascals, density in kg/m^3 via the ideal
//! gas law `rho = p / (0.2869 * (T + 273.1))`.
//!
//! The three segments are fits published to limited precision, so density is
//! only approximately continuous at the 11 km and 25 km boundaries (within
//! about 0.1% and 1.5% respectively). That is accurate enough for terminal
//! velocity estimates, which vary with the square root of density.

/// Tropopause boundary between the linear-lapse and isothermal segments (m).
pub const TROPOPAUSE_ALTITUDE: f64 = 11_000.0;

/// Boundary between the isothermal and upper stratosphere segments (m).
pub const UPPER_STRATOSPHERE_ALTITUDE: f64 = 25_000.0;

/// Air density in kg/m^3 at the given altitude in metres above sea level.
///
/// Pure function of altitude; never fails. Altitudes below sea level
/// extrapolate the troposphere segment, which is adequate for the few tens
/// of metres a landing site can sit below datum.
#[must_use]
pub fn density(altitude: f64) -> f64 {
    let (temperature, pressure) = temperature_and_pressure(altitude);
    pressure / (0.2869 * (temperature + 273.1))
}

/// Temperature in degrees Celsius and pressure in kilopascals at the given
/// altitude in metres.
fn temperature_and_pressure(altitude: f64) -> (f64, f64) {
    if altitude > UPPER_STRATOSPHERE_ALTITUDE {
        let temperature = -131.21 + 0.00299 * altitude;
        let pressure = 2.488 * ((temperature + 273.1) / 216.6).powf(-11.388);
        (temperature, pressure)
    } else if altitude > TROPOPAUSE_ALTITUDE {
        let temperature = -56.46;
        let pressure = 22.65 * (1.73 - 0.000157 * altitude).exp();
        (temperature, pressure)
    } else {
        let temperature = 15.04 - 0.00649 * altitude;
        let pressure = 101.29 * ((temperature + 273.1) / 288.08).powf(5.256);
        (temperature, pressure)
    }
}
