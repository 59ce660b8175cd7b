#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Orchestration of the synthetic crop dataset generator.
//!
//! Two steps produce the dataset for one county:
//!
//! 1. [`crops::run`] fetches crop production, tessellates the county and
//!    writes one simulated crop label per grid point.
//! 2. [`conditions::run`] samples monthly climate and terrain covariates
//!    for every grid point, joins the crop labels and phenology, and writes
//!    one CSV per month, repaired by [`repair`].
//!
//! Every entry point takes a [`RunConfig`]; nothing is read from globals.

pub mod artifacts;
pub mod commands;
pub mod conditions;
pub mod config;
pub mod crops;
pub mod interactive;
pub mod paths;
pub mod repair;

use std::fmt::Write as _;

use agrisynth_location::LocationError;
use agrisynth_location::registry::LocationRegistry;
use agrisynth_simulation::SimulationError;
use agrisynth_source::SourceError;

pub use config::RunConfig;

/// Errors that can occur while running a pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A precondition of the simulation core was violated.
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    /// An external data source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A location or key could not be resolved.
    #[error(transparent)]
    Location(#[from] LocationError),

    /// Reading or writing a CSV artifact failed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Artifact path.
        path: String,
        /// Underlying error.
        source: csv::Error,
    },

    /// Reading or writing a JSON artifact failed.
    #[error("JSON error in {path}: {source}")]
    Json {
        /// Artifact path.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// File system error.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// An artifact write kept failing until the attempt cap.
    #[error("Writing {path} failed after {attempts} attempts: {message}")]
    WriteFailed {
        /// Artifact path.
        path: String,
        /// Number of attempts made.
        attempts: u32,
        /// The last error seen.
        message: String,
    },

    /// The run configuration is unusable.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong with it.
        message: String,
    },

    /// Some months of the conditions step failed.
    #[error("Conditions failed for month(s) {}", join_months(.months))]
    MonthsFailed {
        /// The failed months, in processing order.
        months: Vec<u32>,
    },
}

fn join_months(months: &[u32]) -> String {
    months
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders the location listing shown by the `locations` command.
#[must_use]
pub fn location_table(registry: &LocationRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:<24} {:<6} {:<7} ROI (top-left -> bottom-right)",
        "ID", "NAME", "STATE", "COUNTY"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));
    for location in registry.iter() {
        let _ = writeln!(
            out,
            "{:<12} {:<24} {:<6} {:<7} ({}, {}) -> ({}, {})",
            location.id,
            location.name,
            location.state_fips,
            location.county_fips,
            location.top_left[0],
            location.top_left[1],
            location.bottom_right[0],
            location.bottom_right[1],
        );
    }
    out
}

#[cfg(test)]
mod test_support {
    use std::path::PathBuf;

    use agrisynth_location::Location;

    /// A unique scratch directory under the system temp dir.
    pub fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "agrisynth_pipeline_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// The small two-point region used across tests.
    pub fn tiny_location() -> Location {
        Location {
            id: "tiny".to_string(),
            name: "Texas_Tiny".to_string(),
            state_fips: "48".to_string(),
            county_fips: "999".to_string(),
            top_left: [27.0, -98.0],
            bottom_right: [26.9, -97.9],
        }
    }
}
