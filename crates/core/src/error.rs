//! Error taxonomy for the prediction engine.
//!
//! Three families, by where the failure is detected:
//!
//! - [`ConfigError`]: invalid launch or flight parameters, caught before the
//!   simulation starts.
//! - [`DataError`]: the wind dataset cannot serve the run - a missing or
//!   malformed tile, wrong grid geometry, or a query outside the covered
//!   area or period.
//! - [`SimulationError`]: an internal invariant was violated mid-run.
//!
//! All of them are unrecoverable at this layer. Continuing a run with wrong
//! wind data would silently produce a wrong landing prediction, so the run
//! aborts and reports the specific violated expectation. [`PredictionError`]
//! wraps the families (plus output I/O failures) for callers of the
//! integrator.

use crate::core_types::TileCoords;

/// Invalid launch, flight, or scenario parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter that must be strictly positive was not.
    NonPositive { name: &'static str, value: f64 },
    /// A parameter fell outside its allowed range.
    OutOfRange { name: &'static str, value: f64 },
    /// A required parameter was not supplied.
    Missing { field: &'static str },
    /// Two mutually exclusive parameters were both supplied.
    Conflicting { first: &'static str, second: &'static str },
    /// Failed to read a scenario file.
    LoadFailed(String),
    /// Failed to parse scenario file contents.
    ParseFailed(String),
    /// Failed to serialize a scenario.
    SerializeFailed(String),
    /// Failed to write a scenario file.
    SaveFailed(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NonPositive { name, value } => {
                write!(f, "{name} must be positive, got {value}")
            }
            ConfigError::OutOfRange { name, value } => {
                write!(f, "{name} is out of range: {value}")
            }
            ConfigError::Missing { field } => write!(f, "missing required parameter: {field}"),
            ConfigError::Conflicting { first, second } => {
                write!(f, "{first} and {second} cannot both be given")
            }
            ConfigError::LoadFailed(msg) => write!(f, "failed to load scenario: {msg}"),
            ConfigError::ParseFailed(msg) => write!(f, "failed to parse scenario: {msg}"),
            ConfigError::SerializeFailed(msg) => write!(f, "failed to serialize scenario: {msg}"),
            ConfigError::SaveFailed(msg) => write!(f, "failed to save scenario: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A violated expectation about the layout of one wind tile file.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// The header line did not have exactly 8 comma-separated fields.
    HeaderFieldCount { found: usize },
    /// The grid is not the configured number of points per side.
    GridSize { u_size: usize, v_size: usize, expected: usize },
    /// The header bounds imply a different grid resolution than configured.
    Resolution { found: f64, expected: f64 },
    /// The header bounds do not start at the requested tile corner.
    TileMismatch { file_lat: f64, file_lng: f64, tile: TileCoords },
    /// A body row declared a type other than `wind_u` (-1), `wind_v` (-2) or
    /// altitude (-3).
    UnknownRowType { row: usize, row_type: i64 },
    /// A body row carried the wrong number of grid values.
    ValueCount { row: usize, found: usize, expected: usize },
    /// A token could not be parsed as a number.
    Parse { line: usize, token: String },
    /// The file ended with a pressure level missing one or more of its
    /// three component rows.
    IncompleteLevel { level: usize },
    /// The file carried a header but no data rows.
    EmptyBody,
    /// A grid was constructed with the wrong number of points.
    GridLength { found: usize, expected: usize },
    /// I/O failure while reading the file body.
    Read(String),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::HeaderFieldCount { found } => {
                write!(f, "header has {found} fields, expected 8")
            }
            FormatError::GridSize { u_size, v_size, expected } => {
                write!(f, "grid is {u_size}x{v_size} points, expected {expected}x{expected}")
            }
            FormatError::Resolution { found, expected } => {
                write!(f, "grid resolution is {found} degrees, expected {expected}")
            }
            FormatError::TileMismatch { file_lat, file_lng, tile } => {
                write!(f, "file covers ({file_lat}, {file_lng}), requested tile {tile}")
            }
            FormatError::UnknownRowType { row, row_type } => {
                write!(f, "row {row} has unknown type {row_type}")
            }
            FormatError::ValueCount { row, found, expected } => {
                write!(f, "row {row} has {found} values, expected {expected}")
            }
            FormatError::Parse { line, token } => {
                write!(f, "line {line}: cannot parse {token:?} as a number")
            }
            FormatError::IncompleteLevel { level } => {
                write!(f, "pressure level {level} is missing component rows")
            }
            FormatError::EmptyBody => write!(f, "file has no data rows"),
            FormatError::GridLength { found, expected } => {
                write!(f, "grid has {found} points, expected {expected}")
            }
            FormatError::Read(msg) => write!(f, "read failed: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

/// The wind dataset cannot serve the requested point or time.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    /// No tile file covers the requested point.
    SpatialGap { tile: TileCoords },
    /// No snapshot window for the tile contains the requested time.
    TemporalGap { tile: TileCoords, timestamp: i64 },
    /// The snapshot after `past` does not start exactly one period later.
    NonContiguousWindow { past_start: i64, future_start: i64, period: i64 },
    /// A loaded snapshot's header timestamp contradicts the requested window.
    WindowMismatch { valid_from: i64, timestamp: i64 },
    /// The queried point lies outside the tile the snapshot covers.
    PointOutsideTile { latitude: f64, longitude: f64, tile: TileCoords },
    /// The two snapshots of a window carry different numbers of pressure
    /// levels.
    LevelMismatch { past: usize, future: usize },
    /// A tile file violated the expected layout.
    Format(FormatError),
    /// The tile store failed for a reason other than a coverage gap.
    Store(String),
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::SpatialGap { tile } => {
                write!(f, "no wind data covers tile {tile}")
            }
            DataError::TemporalGap { tile, timestamp } => {
                write!(f, "no wind data for tile {tile} covers timestamp {timestamp}")
            }
            DataError::NonContiguousWindow { past_start, future_start, period } => {
                write!(
                    f,
                    "snapshot at {future_start} does not follow on from {past_start} \
                     (period {period} s)"
                )
            }
            DataError::WindowMismatch { valid_from, timestamp } => {
                write!(
                    f,
                    "snapshot valid from {valid_from} does not cover timestamp {timestamp}"
                )
            }
            DataError::PointOutsideTile { latitude, longitude, tile } => {
                write!(f, "point ({latitude}, {longitude}) is outside tile {tile}")
            }
            DataError::LevelMismatch { past, future } => {
                write!(
                    f,
                    "snapshots carry {past} and {future} pressure levels, expected equal"
                )
            }
            DataError::Format(err) => write!(f, "malformed wind data file: {err}"),
            DataError::Store(msg) => write!(f, "tile store failure: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}

impl From<FormatError> for DataError {
    fn from(err: FormatError) -> Self {
        DataError::Format(err)
    }
}

/// An internal invariant was violated during the run.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Combined wind variance came out negative.
    NegativeVariance { variance: f64 },
    /// The perturbation distribution could not be constructed.
    Sampling(String),
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::NegativeVariance { variance } => {
                write!(f, "wind variance is negative: {variance}")
            }
            SimulationError::Sampling(msg) => write!(f, "wind sampling failed: {msg}"),
        }
    }
}

impl std::error::Error for SimulationError {}

/// Any failure that aborts a prediction run.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionError {
    Config(ConfigError),
    Data(DataError),
    Simulation(SimulationError),
    /// Position writer I/O failure. Fatal like the rest: a truncated
    /// position log would be read as a wrong landing point downstream.
    Output(String),
}

impl std::fmt::Display for PredictionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictionError::Config(err) => write!(f, "configuration error: {err}"),
            PredictionError::Data(err) => write!(f, "wind data error: {err}"),
            PredictionError::Simulation(err) => write!(f, "simulation error: {err}"),
            PredictionError::Output(msg) => write!(f, "output error: {msg}"),
        }
    }
}

impl std::error::Error for PredictionError {}

impl From<ConfigError> for PredictionError {
    fn from(err: ConfigError) -> Self {
        PredictionError::Config(err)
    }
}

impl From<DataError> for PredictionError {
    fn from(err: DataError) -> Self {
        PredictionError::Data(err)
    }
}

impl From<SimulationError> for PredictionError {
    fn from(err: SimulationError) -> Self {
        PredictionError::Simulation(err)
    }
}

impl From<std::io::Error> for PredictionError {
    fn from(err: std::io::Error) -> Self {
        PredictionError::Output(err.to_string())
    }
}
