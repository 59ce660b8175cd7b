//! Run parameters shared by every step.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use agrisynth_simulation::labels::DEFAULT_MIN_RATIO;
use agrisynth_source::quickstats::DEFAULT_CATEGORIES;
use agrisynth_source::retry::RetryPolicy;

use crate::PipelineError;

/// Default census year.
pub const DEFAULT_YEAR: i32 = 2020;

/// Default grid block side in meters.
pub const DEFAULT_BLOCK_SIDE_M: f64 = 1000.0;

/// Default covariate sampling scale in meters.
pub const DEFAULT_SCALE_M: f64 = 1000.0;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// Everything a run needs besides the external services.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Location id in the registry.
    pub location: String,
    /// Census year; also the lower bound of the statistics query.
    pub year: i32,
    /// Grid block side in meters.
    pub block_side_m: f64,
    /// Minimum production share for a crop to receive labels.
    pub min_ratio: f64,
    /// First month to sample (1-12).
    pub starting_month: u32,
    /// Number of consecutive months to sample, clamped at December.
    pub number_of_months: u32,
    /// Keep only the first `n` grid points in written and sampled data.
    pub sample_size: Option<usize>,
    /// Covariate sampling scale in meters.
    pub scale_m: f64,
    /// Directory all artifacts are read from and written to.
    pub output_dir: PathBuf,
    /// Phenology JSON to use instead of the default path.
    pub phenology_file: Option<PathBuf>,
    /// Statistics commodity groups to query.
    pub categories: Vec<String>,
    /// Retry policy for network calls and artifact writes.
    pub retry: RetryPolicy,
}

impl RunConfig {
    /// Creates a configuration for `location` with default parameters.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            year: DEFAULT_YEAR,
            block_side_m: DEFAULT_BLOCK_SIDE_M,
            min_ratio: DEFAULT_MIN_RATIO,
            starting_month: 1,
            number_of_months: 12,
            sample_size: None,
            scale_m: DEFAULT_SCALE_M,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            phenology_file: None,
            categories: DEFAULT_CATEGORIES.iter().map(ToString::to_string).collect(),
            retry: RetryPolicy::default(),
        }
    }

    /// The months to sample, `starting_month` through at most December.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the starting month is not
    /// 1-12 or no months are requested.
    pub fn months(&self) -> Result<RangeInclusive<u32>, PipelineError> {
        if !(1..=12).contains(&self.starting_month) {
            return Err(PipelineError::InvalidConfig {
                message: format!("starting month {} is not 1-12", self.starting_month),
            });
        }
        if self.number_of_months == 0 {
            return Err(PipelineError::InvalidConfig {
                message: "number of months must be at least 1".to_string(),
            });
        }
        let last = self
            .starting_month
            .saturating_add(self.number_of_months - 1)
            .min(12);
        Ok(self.starting_month..=last)
    }

    /// Applies the sample-size cap to a list of grid items.
    pub fn cap<T>(&self, items: &mut Vec<T>) {
        if let Some(limit) = self.sample_size {
            items.truncate(limit);
        }
    }

    /// Category names as string slices.
    #[must_use]
    pub fn category_refs(&self) -> Vec<&str> {
        self.categories.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RunConfig::new("willacy");
        assert_eq!(config.year, 2020);
        assert!((config.block_side_m - 1000.0).abs() < f64::EPSILON);
        assert!((config.min_ratio - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.months().unwrap(), 1..=12);
        assert_eq!(config.category_refs(), vec!["VEGETABLES", "FRUIT & TREE NUTS"]);
        assert_eq!(config.output_dir, PathBuf::from("data"));
    }

    #[test]
    fn months_clamp_at_december() {
        let mut config = RunConfig::new("willacy");
        config.starting_month = 11;
        config.number_of_months = 5;
        assert_eq!(config.months().unwrap(), 11..=12);

        config.starting_month = 3;
        config.number_of_months = 1;
        assert_eq!(config.months().unwrap(), 3..=3);
    }

    #[test]
    fn invalid_months_are_rejected() {
        let mut config = RunConfig::new("willacy");
        config.starting_month = 13;
        assert!(config.months().is_err());

        config.starting_month = 1;
        config.number_of_months = 0;
        assert!(config.months().is_err());
    }

    #[test]
    fn cap_truncates_only_when_set() {
        let mut config = RunConfig::new("willacy");
        let mut items = vec![1, 2, 3, 4];
        config.cap(&mut items);
        assert_eq!(items.len(), 4);

        config.sample_size = Some(2);
        config.cap(&mut items);
        assert_eq!(items, vec![1, 2]);
    }
}
