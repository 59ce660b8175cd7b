//! Annual crop step: production statistics to labelled grid.

use std::path::PathBuf;
use std::sync::Arc;

use agrisynth_dataset_models::{BlockCoordinate, CropProductionTable};
use agrisynth_location::Location;
use agrisynth_simulation::{grid, labels};
use agrisynth_source::progress::ProgressCallback;
use agrisynth_source::quickstats::{self, CropQuery, CropStatistics};

use crate::{PipelineError, RunConfig, artifacts, paths};

const STAGES: u64 = 4;

/// What the crops step produced.
#[derive(Debug, Clone)]
pub struct CropsOutcome {
    /// Production per crop as fetched.
    pub productions: CropProductionTable,
    /// Number of grid points in the region.
    pub grid_points: usize,
    /// Length of the simulated label sequence.
    pub labels: usize,
    /// Rows written after the sample-size cap.
    pub rows_written: usize,
    /// Grid-and-label CSV path.
    pub labels_csv: PathBuf,
    /// Block-coordinate JSON path.
    pub coordinates_json: PathBuf,
}

/// Runs the crops step for `location`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the statistics cannot be fetched, the
/// region or production data violate a simulation precondition, or an
/// artifact cannot be written.
pub async fn run(
    config: &RunConfig,
    location: &Location,
    stats: &dyn CropStatistics,
    api_key: &str,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<CropsOutcome, PipelineError> {
    progress.set_total(STAGES);

    progress.set_message(format!("Fetching crop statistics for {}", location.name));
    let query = CropQuery {
        api_key,
        state_fips: &location.state_fips,
        county_fips: &location.county_fips,
        year_lower_bound: config.year,
    };
    let productions =
        quickstats::fetch_crop_productions(stats, &query, &config.category_refs()).await?;
    log::info!("Crop production data retrieved:");
    for entry in productions.iter() {
        log::info!("{}: {}", entry.crop, entry.production);
    }
    progress.inc(1);

    progress.set_message(format!("Partitioning {}", location.name));
    let points = grid::partition_roi(&location.roi(), config.block_side_m)?;
    log::info!(
        "{}: {} grid points of {} m",
        location.name,
        points.len(),
        config.block_side_m
    );
    progress.inc(1);

    progress.set_message("Simulating crop labels".to_string());
    let crop_labels =
        labels::simulate_crop_distribution(&productions, points.len(), config.min_ratio)?;
    for (crop, count) in labels::label_counts(&crop_labels) {
        log::debug!("{crop}: {count} blocks");
    }
    let mut blocks = labels::assign_labels(&points, &crop_labels)?;
    progress.inc(1);

    progress.set_message("Writing crop artifacts".to_string());
    config.cap(&mut blocks);
    let coordinates: Vec<BlockCoordinate> = blocks.iter().map(BlockCoordinate::from).collect();

    let labels_csv = paths::labels_csv_path(&config.output_dir, config.year, &location.name);
    let coordinates_json = paths::block_coordinates_path(&config.output_dir, &location.name);
    artifacts::write_labeled_blocks(&config.retry, &labels_csv, &blocks).await?;
    artifacts::write_block_coordinates(&config.retry, &coordinates_json, &coordinates).await?;
    progress.inc(1);

    progress.finish(format!(
        "{}: {} labelled blocks written",
        location.name,
        blocks.len()
    ));

    Ok(CropsOutcome {
        productions,
        grid_points: points.len(),
        labels: crop_labels.len(),
        rows_written: blocks.len(),
        labels_csv,
        coordinates_json,
    })
}

#[cfg(test)]
mod tests {
    use agrisynth_source::SourceError;
    use agrisynth_source::progress::null_progress;
    use agrisynth_source::quickstats::CropRecord;
    use agrisynth_source::retry::RetryPolicy;
    use async_trait::async_trait;

    use super::*;
    use crate::test_support::{scratch_dir, tiny_location};

    struct FixedStats(Vec<CropRecord>);

    #[async_trait]
    impl CropStatistics for FixedStats {
        async fn fetch_category(
            &self,
            _query: &CropQuery<'_>,
            category: &str,
        ) -> Result<Vec<CropRecord>, SourceError> {
            if category == "VEGETABLES" {
                Ok(self.0.clone())
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn record(crop: &str, value: &str) -> CropRecord {
        CropRecord {
            commodity_desc: crop.to_string(),
            value: value.to_string(),
        }
    }

    fn config(dir: &std::path::Path) -> RunConfig {
        let mut config = RunConfig::new("tiny");
        config.block_side_m = 5000.0;
        config.output_dir = dir.to_path_buf();
        config.retry = RetryPolicy::immediate(1);
        config
    }

    #[tokio::test]
    async fn writes_labelled_grid_for_tiny_region() {
        let dir = scratch_dir("crops_tiny");
        let stats = FixedStats(vec![
            record("CORN", "70"),
            record("BEANS", "25"),
            record("VEGETABLE TOTALS", "95"),
        ]);

        let outcome = run(
            &config(&dir),
            &tiny_location(),
            &stats,
            "test-key",
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.grid_points, 2);
        assert_eq!(outcome.rows_written, 2);
        // floor(0.737 * 2) CORN, no BEANS (floor(0.263 * 2) = 0), then CORN as padding.
        assert_eq!(outcome.labels, 2);

        let blocks = artifacts::read_labeled_blocks(&outcome.labels_csv).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!((blocks[0].latitude - 27.0).abs() < f64::EPSILON);
        assert!((blocks[0].longitude + 98.0).abs() < f64::EPSILON);
        assert!(blocks.iter().all(|b| b.crop == "CORN"));

        let coordinates = artifacts::read_block_coordinates(&outcome.coordinates_json).unwrap();
        assert_eq!(coordinates.len(), 2);
        assert_eq!(coordinates[1].key(), blocks[1].key());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn sample_cap_limits_written_rows() {
        let dir = scratch_dir("crops_cap");
        let stats = FixedStats(vec![record("ONIONS", "1,000")]);
        let mut config = config(&dir);
        config.sample_size = Some(1);

        let outcome = run(&config, &tiny_location(), &stats, "k", &null_progress())
            .await
            .unwrap();

        assert_eq!(outcome.grid_points, 2);
        assert_eq!(outcome.rows_written, 1);
        assert_eq!(artifacts::read_labeled_blocks(&outcome.labels_csv).unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn zero_production_is_a_precondition_failure() {
        let dir = scratch_dir("crops_zero");
        let stats = FixedStats(vec![record("ONIONS", "(D)")]);

        let result = run(&config(&dir), &tiny_location(), &stats, "k", &null_progress()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Simulation(
                agrisynth_simulation::SimulationError::InvalidProductionData { .. }
            ))
        ));
        assert!(!paths::labels_csv_path(&dir, 2020, "Texas_Tiny").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
