//! Registry of counties the generator can run on.
//!
//! Built-in entries are `(id, toml_content)` pairs embedded via
//! `include_str!`. Adding a built-in county means creating a TOML file in
//! `locations/` and adding an entry here. A user file with one table per
//! id extends the built-ins and replaces any with the same id.

use std::collections::BTreeMap;
use std::path::Path;

use crate::{Location, LocationError};

/// Number of built-in locations. Enforced by a test.
#[cfg(test)]
const EXPECTED_LOCATION_COUNT: usize = 4;

/// Embedded TOML location definitions.
const LOCATION_TOMLS: &[(&str, &str)] = &[
    ("willacy", include_str!("../locations/willacy.toml")),
    ("hidalgo", include_str!("../locations/hidalgo.toml")),
    ("cameron", include_str!("../locations/cameron.toml")),
    ("starr", include_str!("../locations/starr.toml")),
];

/// All known locations, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct LocationRegistry {
    locations: BTreeMap<String, Location>,
}

impl LocationRegistry {
    /// Loads the built-in locations.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if an embedded definition does not parse
    /// or validate.
    pub fn builtin() -> Result<Self, LocationError> {
        let mut registry = Self::default();
        for (id, toml_str) in LOCATION_TOMLS {
            let location = parse_location(id, toml_str)?;
            registry.insert(location)?;
        }
        Ok(registry)
    }

    /// Loads the built-ins and, if given, merges a user file on top.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if any definition cannot be read, parsed
    /// or validated.
    pub fn load(user_file: Option<&Path>) -> Result<Self, LocationError> {
        let mut registry = Self::builtin()?;
        if let Some(path) = user_file {
            registry.merge_file(path)?;
        }
        Ok(registry)
    }

    /// Merges every table of `path` into the registry.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if the file cannot be read, parsed or
    /// validated.
    pub fn merge_file(&mut self, path: &Path) -> Result<(), LocationError> {
        let contents = std::fs::read_to_string(path).map_err(|source| LocationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.merge_str(&path.display().to_string(), &contents)
    }

    /// Merges TOML tables keyed by location id.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if the text does not parse or an entry
    /// fails validation.
    pub fn merge_str(&mut self, name: &str, contents: &str) -> Result<(), LocationError> {
        let tables: BTreeMap<String, Location> =
            toml::de::from_str(contents).map_err(|source| LocationError::Toml {
                name: name.to_string(),
                source,
            })?;

        for (id, mut location) in tables {
            location.id = id;
            if self.locations.contains_key(&location.id) {
                log::info!("{name}: overriding location '{}'", location.id);
            }
            self.insert(location)?;
        }
        Ok(())
    }

    fn insert(&mut self, location: Location) -> Result<(), LocationError> {
        location.validate()?;
        self.locations.insert(location.id.clone(), location);
        Ok(())
    }

    /// Looks up a location by id.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::UnknownLocation`] listing the known ids.
    pub fn get(&self, id: &str) -> Result<&Location, LocationError> {
        self.locations
            .get(id)
            .ok_or_else(|| LocationError::UnknownLocation {
                id: id.to_string(),
                known: self.ids().collect::<Vec<_>>().join(", "),
            })
    }

    /// Location ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    /// Locations in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    /// Number of locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

fn parse_location(id: &str, toml_str: &str) -> Result<Location, LocationError> {
    let mut location: Location =
        toml::de::from_str(toml_str).map_err(|source| LocationError::Toml {
            name: format!("location '{id}'"),
            source,
        })?;
    location.id = id.to_string();
    Ok(location)
}
