//! Core types and utilities

pub mod position;
pub mod wind_vector;

pub use position::{
    metres_per_degree_latitude, metres_per_degree_longitude, normalise_longitude, GeoPosition,
    TileCoords,
};
pub use wind_vector::WindVector;
