#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Deterministic core of the dataset generator.
//!
//! [`grid`] tessellates a region of interest into a lattice of sample
//! points spaced by a physical block side, and [`labels`] turns aggregate
//! crop production into a proportionally sized sequence of crop labels that
//! is assigned to those points by position.
//!
//! Both are pure functions of their inputs: the same region, block side and
//! production table always yield bit-identical points and labels.

pub mod grid;
pub mod labels;

/// Precondition violations detected by the simulation core.
///
/// None of these are transient, so callers should not retry them.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The region corners are not a northwest/southeast pair of valid
    /// coordinates.
    #[error("Invalid region: {message}")]
    InvalidRegion {
        /// Description of what is wrong with the region.
        message: String,
    },

    /// The block side is not a positive, finite length.
    #[error("Invalid block side: {block_side_m} m")]
    InvalidBlockSide {
        /// The rejected block side in meters.
        block_side_m: f64,
    },

    /// The region is smaller than one block in at least one dimension.
    #[error(
        "Region is smaller than one {block_side_m} m block \
         (north-south {north_south_m:.1} m, east-west {east_west_m:.1} m)"
    )]
    DegenerateRegion {
        /// Geodesic north-south extent of the region.
        north_south_m: f64,
        /// Geodesic east-west extent along the northern edge.
        east_west_m: f64,
        /// Requested block side.
        block_side_m: f64,
    },

    /// Production data cannot be turned into proportions.
    #[error("Invalid production data: {message}")]
    InvalidProductionData {
        /// Description of what is wrong with the data.
        message: String,
    },

    /// Labels were requested for grid points but the label sequence is empty.
    #[error("No crop labels to assign to {points} grid points")]
    EmptyLabels {
        /// Number of grid points awaiting a label.
        points: usize,
    },
}
