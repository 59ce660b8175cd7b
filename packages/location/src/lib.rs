#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Counties the generator knows about, and where API keys come from.
//!
//! Locations are TOML tables with a display name, state and county FIPS
//! codes, and the corners of the region of interest. A set of built-in
//! locations is compiled in (see [`registry`]); a user file can add more
//! or override built-ins by id.

pub mod keys;
pub mod registry;

use agrisynth_dataset_models::{GeoPoint, Roi};
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading locations or keys.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    /// I/O error reading a registry or keys file.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that could not be read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A registry or keys file is not valid TOML for its schema.
    #[error("Failed to parse {name}: {source}")]
    Toml {
        /// File or entry name.
        name: String,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// No location with the requested id.
    #[error("Unknown location '{id}'. Known locations: {known}")]
    UnknownLocation {
        /// Requested id.
        id: String,
        /// Comma-separated known ids.
        known: String,
    },

    /// No API key in the environment or the keys file.
    #[error("No {service} API key: set {env_var} or add it to the keys file")]
    MissingApiKey {
        /// Service the key is for.
        service: &'static str,
        /// Environment variable that was checked.
        env_var: &'static str,
    },

    /// A location failed validation.
    #[error("Invalid location '{id}': {message}")]
    InvalidLocation {
        /// Location id.
        id: String,
        /// What is wrong with it.
        message: String,
    },

    /// A FIPS code has the wrong shape.
    #[error("Invalid {kind} FIPS code '{code}' for location '{id}': expected {digits} digits")]
    InvalidFips {
        /// Location id.
        id: String,
        /// `"state"` or `"county"`.
        kind: &'static str,
        /// The offending code.
        code: String,
        /// Expected number of digits.
        digits: usize,
    },
}

/// A county and its region of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Registry key (e.g. `"willacy"`). Filled from the table key, not
    /// the table body.
    #[serde(skip)]
    pub id: String,
    /// Name used in output file names, formatted `State_County`.
    pub name: String,
    /// Two-digit state FIPS code.
    pub state_fips: String,
    /// Three-digit county FIPS code.
    pub county_fips: String,
    /// Northwest corner as `[latitude, longitude]`.
    pub top_left: [f64; 2],
    /// Southeast corner as `[latitude, longitude]`.
    pub bottom_right: [f64; 2],
}

impl Location {
    /// Region of interest spanned by the two corners.
    #[must_use]
    pub const fn roi(&self) -> Roi {
        Roi::new(
            GeoPoint::new(self.top_left[0], self.top_left[1]),
            GeoPoint::new(self.bottom_right[0], self.bottom_right[1]),
        )
    }

    /// Checks FIPS codes, the output name and corner order.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::InvalidFips`] or
    /// [`LocationError::InvalidLocation`] describing the first problem.
    pub fn validate(&self) -> Result<(), LocationError> {
        check_fips(&self.id, "state", &self.state_fips, 2)?;
        check_fips(&self.id, "county", &self.county_fips, 3)?;

        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(LocationError::InvalidLocation {
                id: self.id.clone(),
                message: format!(
                    "name '{}' must be non-empty and contain only letters, digits, '_' or '-'",
                    self.name
                ),
            });
        }

        if !self.roi().is_northwest_ordered() {
            return Err(LocationError::InvalidLocation {
                id: self.id.clone(),
                message: "top_left must be north-west of bottom_right".to_string(),
            });
        }

        Ok(())
    }
}

fn check_fips(id: &str, kind: &'static str, code: &str, digits: usize) -> Result<(), LocationError> {
    if code.len() == digits && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(LocationError::InvalidFips {
            id: id.to_string(),
            kind,
            code: code.to_string(),
            digits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn willacy() -> Location {
        Location {
            id: "willacy".to_string(),
            name: "Texas_Willacy".to_string(),
            state_fips: "48".to_string(),
            county_fips: "489".to_string(),
            top_left: [26.62, -97.99],
            bottom_right: [26.27, -97.26],
        }
    }

    #[test]
    fn valid_location_passes() {
        willacy().validate().unwrap();
    }

    #[test]
    fn roi_uses_lat_lon_order() {
        let roi = willacy().roi();
        assert!((roi.top_left.latitude - 26.62).abs() < f64::EPSILON);
        assert!((roi.top_left.longitude + 97.99).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_short_county_code() {
        let mut location = willacy();
        location.county_fips = "61".to_string();
        assert!(matches!(
            location.validate(),
            Err(LocationError::InvalidFips {
                kind: "county",
                digits: 3,
                ..
            })
        ));
    }

    #[test]
    fn rejects_non_numeric_state_code() {
        let mut location = willacy();
        location.state_fips = "TX".to_string();
        assert!(matches!(
            location.validate(),
            Err(LocationError::InvalidFips { kind: "state", .. })
        ));
    }

    #[test]
    fn rejects_swapped_corners() {
        let mut location = willacy();
        std::mem::swap(&mut location.top_left, &mut location.bottom_right);
        assert!(matches!(
            location.validate(),
            Err(LocationError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn rejects_path_like_names() {
        let mut location = willacy();
        location.name = "../etc".to_string();
        assert!(location.validate().is_err());
    }
}
