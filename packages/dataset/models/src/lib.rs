#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the synthetic crop dataset generator.
//!
//! Every artifact the pipeline persists (grid-and-label CSV, block
//! coordinate JSON, phenology JSON, per-month sample CSV) has a row type
//! here, so that reading and writing stay in lockstep across crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter};

/// A geographic position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a point from a `(latitude, longitude)` pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns the exact join key for this point.
    #[must_use]
    pub fn key(&self) -> CoordKey {
        CoordKey::new(self.longitude, self.latitude)
    }
}

/// Exact, hashable identity of a coordinate pair.
///
/// Built from the IEEE-754 bit patterns of `(longitude, latitude)`, so two
/// keys are equal only when both floats are bit-identical. `-0.0` is folded
/// into `0.0`. Coordinates written with shortest round-trip formatting
/// (what `csv` and `serde_json` emit) parse back into the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoordKey {
    longitude_bits: u64,
    latitude_bits: u64,
}

impl CoordKey {
    /// Creates a key from a longitude/latitude pair.
    #[must_use]
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude_bits: canonical_bits(longitude),
            latitude_bits: canonical_bits(latitude),
        }
    }

    /// Longitude this key was built from.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        f64::from_bits(self.longitude_bits)
    }

    /// Latitude this key was built from.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        f64::from_bits(self.latitude_bits)
    }
}

impl fmt::Display for CoordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.longitude(), self.latitude())
    }
}

fn canonical_bits(value: f64) -> u64 {
    let value = if value == 0.0 { 0.0_f64 } else { value };
    value.to_bits()
}

/// A rectangular region of interest given by its northwest and southeast
/// corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    /// Northwest corner.
    pub top_left: GeoPoint,
    /// Southeast corner.
    pub bottom_right: GeoPoint,
}

impl Roi {
    /// Creates a region from its two corners without validating them.
    #[must_use]
    pub const fn new(top_left: GeoPoint, bottom_right: GeoPoint) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Returns `true` when `top_left` is strictly north and strictly west of
    /// `bottom_right`.
    #[must_use]
    pub fn is_northwest_ordered(&self) -> bool {
        self.top_left.latitude > self.bottom_right.latitude
            && self.top_left.longitude < self.bottom_right.longitude
    }
}

/// Returns `true` if `crop` is an aggregate rollup row such as
/// `VEGETABLE TOTALS` rather than a distinct crop.
#[must_use]
pub fn is_totals_crop(crop: &str) -> bool {
    let crop = crop.trim();
    crop.eq_ignore_ascii_case("TOTALS")
        || crop
            .get(crop.len().saturating_sub(" TOTALS".len())..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(" TOTALS"))
}

/// Cumulative production for one crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropProduction {
    /// Commodity name as reported by the statistics service.
    pub crop: String,
    /// Production summed across categories and years.
    pub production: f64,
}

/// Crop name to cumulative production, in first-seen order.
///
/// Order matters: the label simulator walks crops in this order both for
/// proportional allocation and for padding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CropProductionTable {
    entries: Vec<CropProduction>,
}

impl CropProductionTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds `production` to `crop`, appending the crop if it is new.
    pub fn add(&mut self, crop: &str, production: f64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.crop == crop) {
            entry.production += production;
        } else {
            self.entries.push(CropProduction {
                crop: crop.to_string(),
                production,
            });
        }
    }

    /// Returns the production recorded for `crop`.
    #[must_use]
    pub fn get(&self, crop: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.crop == crop)
            .map(|e| e.production)
    }

    /// Iterates over every entry, totals rows included.
    pub fn iter(&self) -> impl Iterator<Item = &CropProduction> {
        self.entries.iter()
    }

    /// Iterates over distinct crops, skipping totals rows.
    pub fn crops(&self) -> impl Iterator<Item = &CropProduction> {
        self.entries.iter().filter(|e| !is_totals_crop(&e.crop))
    }

    /// Sum of production over distinct crops (totals rows excluded).
    #[must_use]
    pub fn total_production(&self) -> f64 {
        self.crops().map(|e| e.production).sum()
    }

    /// Number of entries, totals rows included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no crop has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, f64)> for CropProductionTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (crop, production) in iter {
            table.add(crop.as_ref(), production);
        }
        table
    }
}

/// Planting calendar for one crop, read from the phenology JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhenologyEntry {
    /// Crop name, matching the statistics service commodity name.
    pub crop: String,
    /// Month of planting (1-12).
    pub planting_month: u8,
    /// Months from planting to harvest.
    pub growing_duration_months: u8,
}

/// One row of the grid-and-label CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledBlock {
    /// Grid point longitude.
    pub longitude: f64,
    /// Grid point latitude.
    pub latitude: f64,
    /// Simulated crop label.
    pub crop: String,
}

impl LabeledBlock {
    /// Join key of this block.
    #[must_use]
    pub fn key(&self) -> CoordKey {
        CoordKey::new(self.longitude, self.latitude)
    }
}

/// One entry of the block-coordinate JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockCoordinate {
    /// Grid point longitude.
    pub longitude: f64,
    /// Grid point latitude.
    pub latitude: f64,
}

impl BlockCoordinate {
    /// Join key of this coordinate.
    #[must_use]
    pub fn key(&self) -> CoordKey {
        CoordKey::new(self.longitude, self.latitude)
    }
}

impl From<&LabeledBlock> for BlockCoordinate {
    fn from(block: &LabeledBlock) -> Self {
        Self {
            longitude: block.longitude,
            latitude: block.latitude,
        }
    }
}

/// Environmental covariates sampled for each grid point and month.
///
/// The string form of each variant is the column name used in the
/// per-month output CSV and the property name returned by the sampling
/// service.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    AsRefStr,
)]
pub enum Covariate {
    /// Mean air temperature (°C).
    #[serde(rename = "Temperature")]
    #[strum(serialize = "Temperature")]
    Temperature,
    /// Maximum air temperature over the window (°C).
    #[serde(rename = "Max_Temperature")]
    #[strum(serialize = "Max_Temperature")]
    MaxTemperature,
    /// Minimum air temperature over the window (°C).
    #[serde(rename = "Min_Temperature")]
    #[strum(serialize = "Min_Temperature")]
    MinTemperature,
    /// Mean evapotranspiration.
    #[serde(rename = "Transpiration")]
    #[strum(serialize = "Transpiration")]
    Transpiration,
    /// Mean wind speed.
    #[serde(rename = "Wind_Speed")]
    #[strum(serialize = "Wind_Speed")]
    WindSpeed,
    /// Mean specific humidity.
    #[serde(rename = "Humidity")]
    #[strum(serialize = "Humidity")]
    Humidity,
    /// Terrain elevation (m).
    #[serde(rename = "Elevation")]
    #[strum(serialize = "Elevation")]
    Elevation,
    /// Terrain slope (degrees).
    #[serde(rename = "Slope")]
    #[strum(serialize = "Slope")]
    Slope,
}

/// Covariate values for one point and window. Missing bands are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Covariates {
    /// Mean air temperature.
    pub temperature: Option<f64>,
    /// Maximum air temperature.
    pub max_temperature: Option<f64>,
    /// Minimum air temperature.
    pub min_temperature: Option<f64>,
    /// Evapotranspiration.
    pub transpiration: Option<f64>,
    /// Wind speed.
    pub wind_speed: Option<f64>,
    /// Specific humidity.
    pub humidity: Option<f64>,
    /// Elevation.
    pub elevation: Option<f64>,
    /// Slope.
    pub slope: Option<f64>,
}

impl Covariates {
    /// Sets the value stored for `covariate`.
    pub fn set(&mut self, covariate: Covariate, value: Option<f64>) {
        let slot = match covariate {
            Covariate::Temperature => &mut self.temperature,
            Covariate::MaxTemperature => &mut self.max_temperature,
            Covariate::MinTemperature => &mut self.min_temperature,
            Covariate::Transpiration => &mut self.transpiration,
            Covariate::WindSpeed => &mut self.wind_speed,
            Covariate::Humidity => &mut self.humidity,
            Covariate::Elevation => &mut self.elevation,
            Covariate::Slope => &mut self.slope,
        };
        *slot = value;
    }
}

/// One row of a per-month output CSV.
///
/// Field order is the column order of the persisted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Temperature")]
    pub temperature: Option<f64>,
    #[serde(rename = "Max_Temperature")]
    pub max_temperature: Option<f64>,
    #[serde(rename = "Min_Temperature")]
    pub min_temperature: Option<f64>,
    #[serde(rename = "Transpiration")]
    pub transpiration: Option<f64>,
    #[serde(rename = "Wind_Speed")]
    pub wind_speed: Option<f64>,
    #[serde(rename = "Humidity")]
    pub humidity: Option<f64>,
    #[serde(rename = "Elevation")]
    pub elevation: Option<f64>,
    #[serde(rename = "Slope")]
    pub slope: Option<f64>,
    #[serde(rename = "Crop")]
    pub crop: Option<String>,
    #[serde(rename = "Plant_Month")]
    pub plant_month: Option<u8>,
    #[serde(rename = "Growing_Duration")]
    pub growing_duration: Option<u8>,
}

impl SampleRecord {
    /// Builds a row from a sampled coordinate. A `None` sample leaves every
    /// covariate empty.
    #[must_use]
    pub fn new(
        coordinate: BlockCoordinate,
        covariates: Option<&Covariates>,
        crop: Option<String>,
        phenology: Option<&PhenologyEntry>,
    ) -> Self {
        let empty = Covariates::default();
        let c = covariates.unwrap_or(&empty);
        Self {
            longitude: coordinate.longitude,
            latitude: coordinate.latitude,
            temperature: c.temperature,
            max_temperature: c.max_temperature,
            min_temperature: c.min_temperature,
            transpiration: c.transpiration,
            wind_speed: c.wind_speed,
            humidity: c.humidity,
            elevation: c.elevation,
            slope: c.slope,
            crop,
            plant_month: phenology.map(|p| p.planting_month),
            growing_duration: phenology.map(|p| p.growing_duration_months),
        }
    }

    /// Join key of this row.
    #[must_use]
    pub fn key(&self) -> CoordKey {
        CoordKey::new(self.longitude, self.latitude)
    }

    /// Sets the crop and its phenology fields.
    pub fn set_crop(&mut self, crop: &str, phenology: Option<&PhenologyEntry>) {
        self.crop = Some(crop.to_string());
        if let Some(p) = phenology {
            self.plant_month = Some(p.planting_month);
            self.growing_duration = Some(p.growing_duration_months);
        }
    }
}
