//! Monthly conditions step: covariates joined with crop labels.
//!
//! For every month the step samples each grid point, joins the point's
//! crop label and that crop's phenology, writes the raw month CSV and then
//! runs the [`repair`](crate::repair) pass into `{location}_data/`.
//!
//! Months are independent. A failed month is logged and does not stop the
//! others; re-running a month overwrites its files.

use std::path::PathBuf;
use std::sync::Arc;

use agrisynth_dataset_models::{BlockCoordinate, SampleRecord};
use agrisynth_location::Location;
use agrisynth_source::covariates::{CovariateSampler, SampleWindow};
use agrisynth_source::progress::ProgressCallback;

use crate::repair::{self, LabelIndex, PhenologyIndex};
use crate::{PipelineError, RunConfig, artifacts, paths};

/// Artifacts the conditions step reads, loaded once per run.
#[derive(Debug, Clone)]
pub struct ConditionsInputs {
    /// Grid points to sample, after the sample-size cap.
    pub coordinates: Vec<BlockCoordinate>,
    /// Crop label per grid point.
    pub labels: LabelIndex,
    /// Phenology per crop.
    pub phenology: PhenologyIndex,
}

impl ConditionsInputs {
    /// Loads the block coordinates, labels and phenology for `location`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any of the three files is missing or
    /// malformed.
    pub fn load(config: &RunConfig, location: &Location) -> Result<Self, PipelineError> {
        let out = &config.output_dir;

        let mut coordinates =
            artifacts::read_block_coordinates(&paths::block_coordinates_path(out, &location.name))?;
        config.cap(&mut coordinates);

        let blocks = artifacts::read_labeled_blocks(&paths::labels_csv_path(
            out,
            config.year,
            &location.name,
        ))?;

        let phenology_file = config
            .phenology_file
            .clone()
            .unwrap_or_else(|| paths::phenology_path(out, &location.name));
        let phenology = artifacts::read_phenology(&phenology_file)?;

        log::info!(
            "{}: {} coordinates, {} labels, {} phenology entries",
            location.name,
            coordinates.len(),
            blocks.len(),
            phenology.len()
        );

        Ok(Self {
            coordinates,
            labels: repair::label_index(&blocks),
            phenology: repair::phenology_index(&phenology),
        })
    }
}

/// What one month produced.
#[derive(Debug, Clone)]
pub struct MonthOutcome {
    /// Month number (1-12).
    pub month: u32,
    /// Rows written.
    pub rows: usize,
    /// Points for which the service had no sample.
    pub absent: usize,
    /// Raw month CSV.
    pub raw_csv: PathBuf,
    /// Repaired month CSV.
    pub repaired_csv: PathBuf,
    /// Result of the repair pass.
    pub repair: repair::RepairReport,
}

/// Samples every point for one window and joins labels and phenology.
///
/// Every point yields a row; points without a sample get empty covariates.
///
/// # Errors
///
/// Returns [`PipelineError::Source`] if the service keeps failing for any
/// point.
pub async fn sample_month(
    config: &RunConfig,
    inputs: &ConditionsInputs,
    sampler: &dyn CovariateSampler,
    window: &SampleWindow,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(Vec<SampleRecord>, usize), PipelineError> {
    let mut records = Vec::with_capacity(inputs.coordinates.len());
    let mut absent = 0;

    for coordinate in &inputs.coordinates {
        let covariates = sampler.sample(*coordinate, window, config.scale_m).await?;
        if covariates.is_none() {
            log::debug!("No sample at {}", coordinate.key());
            absent += 1;
        }

        let crop = inputs.labels.get(&coordinate.key());
        let phenology = crop.and_then(|c| inputs.phenology.get(c));
        records.push(SampleRecord::new(
            *coordinate,
            covariates.as_ref(),
            crop.cloned(),
            phenology,
        ));
        progress.inc(1);
    }

    Ok((records, absent))
}

/// Runs one month end to end: sample, write, repair.
///
/// # Errors
///
/// Returns [`PipelineError`] if sampling or writing fails.
pub async fn run_month(
    config: &RunConfig,
    location: &Location,
    inputs: &ConditionsInputs,
    sampler: &dyn CovariateSampler,
    month: u32,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<MonthOutcome, PipelineError> {
    let window =
        SampleWindow::for_month(config.year, month).ok_or_else(|| PipelineError::InvalidConfig {
            message: format!("month {month} of {} has no date range", config.year),
        })?;

    log::info!(
        "Processing data for month {month} ({} to {})",
        window.start,
        window.end
    );
    progress.set_total(u64::try_from(inputs.coordinates.len()).unwrap_or(u64::MAX));
    progress.set_message(format!("{} {}-{month:02}", location.name, config.year));

    let (records, absent) = sample_month(config, inputs, sampler, &window, progress).await?;

    let out = &config.output_dir;
    let raw_csv = paths::month_csv_path(out, &location.name, config.year, month);
    artifacts::write_samples(&config.retry, &raw_csv, &records).await?;
    log::info!(
        "{} varying data for month {month}, {} saved to {}",
        location.name,
        config.year,
        raw_csv.display()
    );

    let repaired_csv = paths::repaired_month_csv_path(out, &location.name, config.year, month);
    let report = repair::repair_month_file(
        &config.retry,
        &raw_csv,
        &repaired_csv,
        &inputs.labels,
        &inputs.phenology,
    )
    .await?;

    progress.finish(format!(
        "{} month {month}: {} rows, {absent} without sample",
        location.name,
        records.len()
    ));

    Ok(MonthOutcome {
        month,
        rows: records.len(),
        absent,
        raw_csv,
        repaired_csv,
        repair: report,
    })
}

/// Runs the conditions step for every configured month.
///
/// # Errors
///
/// Returns [`PipelineError`] if the inputs cannot be loaded or the month
/// range is invalid, or [`PipelineError::MonthsFailed`] after all months
/// ran if any of them failed.
pub async fn run(
    config: &RunConfig,
    location: &Location,
    sampler: &dyn CovariateSampler,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<MonthOutcome>, PipelineError> {
    let months = config.months()?;
    let inputs = ConditionsInputs::load(config, location)?;

    let mut outcomes = Vec::new();
    let mut failed = Vec::new();

    for month in months {
        match run_month(config, location, &inputs, sampler, month, progress).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                log::error!("{} month {month} failed: {e}", location.name);
                failed.push(month);
            }
        }
    }

    if failed.is_empty() {
        Ok(outcomes)
    } else {
        log::error!(
            "{}: {} month(s) succeeded, {} failed",
            location.name,
            outcomes.len(),
            failed.len()
        );
        Err(PipelineError::MonthsFailed { months: failed })
    }
}
