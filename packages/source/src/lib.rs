#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! External data sources for the dataset generator.
//!
//! Two services are consumed, each behind a trait so the pipeline can be
//! exercised without network access:
//!
//! * [`quickstats::CropStatistics`]: county-level crop production records
//!   from the USDA NASS `QuickStats` API.
//! * [`covariates::CovariateSampler`]: monthly climate and terrain values
//!   for a single coordinate from an Earth-observation sampling service.
//!
//! All HTTP access goes through [`retry`], which classifies each attempt
//! as done, retryable or fatal and applies exponential backoff.

pub mod covariates;
pub mod parsing;
pub mod progress;
pub mod quickstats;
pub mod retry;

/// Errors that can occur while talking to external data sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A retryable operation kept failing until the attempt cap.
    #[error("{label} failed after {attempts} attempts: {message}")]
    Retry {
        /// What was being attempted (e.g. `"QuickStats VEGETABLES"`).
        label: String,
        /// Number of attempts made.
        attempts: u32,
        /// The last error seen.
        message: String,
    },

    /// The service answered with something we cannot use.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}
