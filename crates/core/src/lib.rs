//! Balloon Trajectory Prediction Core Library
//!
//! Predicts the flight path of a high-altitude balloon by integrating an
//! ensemble of particles through gridded wind forecast data. Implements the
//! standard ascent/burst/descent profile with drag-limited descent through
//! a stratified atmosphere.
//!
//! ## Ensemble Prediction
//!
//! The prediction system includes:
//! - Quadrilinear wind interpolation over tiled forecast snapshots
//! - A two-snapshot wind cache that advances along the flight
//! - Deterministic or Gaussian per-particle wind sampling
//! - CSV and KML trajectory output

// Core types and utilities
pub mod core_types;

// Flight physics
pub mod altitude;
pub mod atmosphere;

// Wind data (storage, decoding, interpolation)
pub mod wind;

// Ensemble integration
pub mod ensemble;

// Configuration, errors, and trajectory output
pub mod error;
pub mod output;
pub mod scenario;

// Re-export core types
pub use core_types::{GeoPosition, TileCoords, WindVector};

// Re-export flight model types
pub use altitude::{AltitudeModelState, FlightParameters};

// Re-export wind pipeline types
pub use wind::{
    DirectoryTileStore, TileCache, TileStore, WindGridConfig, WindSample, WindSnapshot,
};

// Re-export ensemble types
pub use ensemble::{
    EnsembleConfig, EnsembleIntegrator, LaunchSite, RunOutcome, RunSummary, WindSampling,
};

// Re-export configuration and output types
pub use error::{ConfigError, DataError, PredictionError, SimulationError};
pub use output::{CsvWriter, KmlWriter, PositionWriter, TeeWriter};
pub use scenario::{FlightProfile, Scenario};
