//! Reading and writing the persisted artifacts.
//!
//! CSV files always start with a header row, even when empty. JSON files
//! are pretty-printed with a trailing newline. Both formats write floats
//! with shortest round-trip formatting. Reading them back is exact for CSV
//! (`str::parse`) and for JSON only with `serde_json`'s `float_roundtrip`
//! feature, which the workspace enables; coordinate keys depend on it.
//!
//! Writes go through [`write_with_retry`]: I/O failures are retried with
//! the run's backoff policy, serialization failures are not.

use std::io::{BufReader, BufWriter, Write as _};
use std::path::Path;

use agrisynth_dataset_models::{BlockCoordinate, LabeledBlock, PhenologyEntry, SampleRecord};
use agrisynth_source::retry::{Attempt, RetryFailure, RetryPolicy, with_backoff};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::PipelineError;
use crate::paths::ensure_dir;

/// Columns of the grid-and-label CSV.
pub const LABEL_COLUMNS: &[&str] = &["longitude", "latitude", "crop"];

/// Columns of the per-month CSV.
pub const SAMPLE_COLUMNS: &[&str] = &[
    "Longitude",
    "Latitude",
    "Temperature",
    "Max_Temperature",
    "Min_Temperature",
    "Transpiration",
    "Wind_Speed",
    "Humidity",
    "Elevation",
    "Slope",
    "Crop",
    "Plant_Month",
    "Growing_Duration",
];

/// Runs `write` until it succeeds, retrying I/O failures.
///
/// # Errors
///
/// Returns [`PipelineError::WriteFailed`] once the policy is exhausted, or
/// the first non-I/O error unchanged.
pub async fn write_with_retry<F>(
    policy: &RetryPolicy,
    path: &Path,
    mut write: F,
) -> Result<(), PipelineError>
where
    F: FnMut(&Path) -> Result<(), PipelineError>,
{
    let label = format!("write {}", path.display());
    with_backoff(policy, &label, |_| {
        let outcome = match write(path) {
            Ok(()) => Attempt::Done(()),
            Err(e) if is_transient(&e) => Attempt::Retry(e),
            Err(e) => Attempt::Fatal(e),
        };
        std::future::ready(outcome)
    })
    .await
    .map_err(|failure| match failure {
        RetryFailure::Exhausted { attempts, last } => PipelineError::WriteFailed {
            path: path.display().to_string(),
            attempts,
            message: last.to_string(),
        },
        RetryFailure::Fatal(e) => e,
    })?;

    log::info!("Wrote {}", path.display());
    Ok(())
}

fn is_transient(error: &PipelineError) -> bool {
    match error {
        PipelineError::Io { .. } => true,
        PipelineError::Csv { source, .. } => source.is_io_error(),
        PipelineError::Json { source, .. } => source.is_io(),
        _ => false,
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> PipelineError {
    PipelineError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> PipelineError {
    PipelineError::Json {
        path: path.display().to_string(),
        source,
    }
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            ensure_dir(parent).map_err(|e| io_error(parent, e))
        }
        _ => Ok(()),
    }
}

/// Writes `rows` as CSV under an explicit header.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be created or a row cannot
/// be serialized.
pub fn write_csv<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: &[T],
) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    writer.write_record(header).map_err(|e| csv_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| io_error(path, e))
}

/// Reads every row of a CSV with a header.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be opened or a row does not
/// match `T`.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| csv_error(path, e))
}

/// Writes `value` as pretty JSON.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be created or written.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let file = std::fs::File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| json_error(path, e))?;
    writer.write_all(b"\n").map_err(|e| io_error(path, e))?;
    writer.flush().map_err(|e| io_error(path, e))
}

/// Reads a JSON document.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be opened or does not
/// match `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let file = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| json_error(path, e))
}

/// Writes the grid-and-label CSV.
///
/// # Errors
///
/// See [`write_with_retry`].
pub async fn write_labeled_blocks(
    policy: &RetryPolicy,
    path: &Path,
    blocks: &[LabeledBlock],
) -> Result<(), PipelineError> {
    write_with_retry(policy, path, |p| write_csv(p, LABEL_COLUMNS, blocks)).await
}

/// Reads the grid-and-label CSV.
///
/// # Errors
///
/// See [`read_csv`].
pub fn read_labeled_blocks(path: &Path) -> Result<Vec<LabeledBlock>, PipelineError> {
    read_csv(path)
}

/// Writes the block-coordinate JSON.
///
/// # Errors
///
/// See [`write_with_retry`].
pub async fn write_block_coordinates(
    policy: &RetryPolicy,
    path: &Path,
    coordinates: &[BlockCoordinate],
) -> Result<(), PipelineError> {
    write_with_retry(policy, path, |p| write_json(p, coordinates)).await
}

/// Reads the block-coordinate JSON.
///
/// # Errors
///
/// See [`read_json`].
pub fn read_block_coordinates(path: &Path) -> Result<Vec<BlockCoordinate>, PipelineError> {
    read_json(path)
}

/// Reads the phenology JSON.
///
/// # Errors
///
/// See [`read_json`]. A missing file is an I/O error.
pub fn read_phenology(path: &Path) -> Result<Vec<PhenologyEntry>, PipelineError> {
    read_json(path)
}

/// Writes a per-month CSV.
///
/// # Errors
///
/// See [`write_with_retry`].
pub async fn write_samples(
    policy: &RetryPolicy,
    path: &Path,
    records: &[SampleRecord],
) -> Result<(), PipelineError> {
    write_with_retry(policy, path, |p| write_csv(p, SAMPLE_COLUMNS, records)).await
}

/// Reads a per-month CSV. Empty cells become `None`.
///
/// # Errors
///
/// See [`read_csv`].
pub fn read_samples(path: &Path) -> Result<Vec<SampleRecord>, PipelineError> {
    read_csv(path)
}
