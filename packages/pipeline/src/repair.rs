//! Repair pass over a month's output.
//!
//! Rows whose crop is empty get the crop label of their grid point, looked
//! up by exact coordinate key, and that crop's phenology. Rows that already
//! have a crop are left alone.

use std::collections::HashMap;
use std::path::Path;

use agrisynth_dataset_models::{CoordKey, LabeledBlock, PhenologyEntry, SampleRecord};
use agrisynth_source::retry::RetryPolicy;

use crate::PipelineError;
use crate::artifacts;

/// Crop label per grid point.
pub type LabelIndex = HashMap<CoordKey, String>;

/// Phenology per crop name.
pub type PhenologyIndex = HashMap<String, PhenologyEntry>;

/// Builds a [`LabelIndex`]. Later rows win on duplicate coordinates.
#[must_use]
pub fn label_index(blocks: &[LabeledBlock]) -> LabelIndex {
    blocks
        .iter()
        .map(|block| (block.key(), block.crop.clone()))
        .collect()
}

/// Builds a [`PhenologyIndex`]. Later entries win on duplicate crops.
#[must_use]
pub fn phenology_index(entries: &[PhenologyEntry]) -> PhenologyIndex {
    entries
        .iter()
        .map(|entry| (entry.crop.clone(), entry.clone()))
        .collect()
}

/// What the repair pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Rows inspected.
    pub rows: usize,
    /// Rows that had no crop and received one.
    pub filled: usize,
    /// Rows that had no crop and no label to fill it from.
    pub unresolved: usize,
}

/// Fills missing crops and their phenology in place.
pub fn repair_records(
    records: &mut [SampleRecord],
    labels: &LabelIndex,
    phenology: &PhenologyIndex,
) -> RepairReport {
    let mut report = RepairReport {
        rows: records.len(),
        ..RepairReport::default()
    };

    for record in records.iter_mut().filter(|r| r.crop.is_none()) {
        let key = record.key();
        if let Some(crop) = labels.get(&key) {
            record.set_crop(crop, phenology.get(crop));
            report.filled += 1;
        } else {
            log::warn!("No crop label for {key}");
            report.unresolved += 1;
        }
    }

    report
}

/// Reads the raw month CSV at `raw`, repairs it and writes the result to
/// `repaired`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the raw file cannot be read or the repaired
/// file cannot be written.
pub async fn repair_month_file(
    policy: &RetryPolicy,
    raw: &Path,
    repaired: &Path,
    labels: &LabelIndex,
    phenology: &PhenologyIndex,
) -> Result<RepairReport, PipelineError> {
    log::info!("Verifying and cleaning {}", raw.display());
    let mut records = artifacts::read_samples(raw)?;
    let report = repair_records(&mut records, labels, phenology);
    artifacts::write_samples(policy, repaired, &records).await?;

    log::info!(
        "Repaired {}: {} rows, {} filled, {} unresolved",
        repaired.display(),
        report.rows,
        report.filled,
        report.unresolved
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use agrisynth_dataset_models::BlockCoordinate;

    use super::*;
    use crate::test_support::scratch_dir;

    fn onions() -> PhenologyEntry {
        PhenologyEntry {
            crop: "ONIONS".to_string(),
            planting_month: 10,
            growing_duration_months: 6,
        }
    }

    fn block(longitude: f64, latitude: f64, crop: &str) -> LabeledBlock {
        LabeledBlock {
            longitude,
            latitude,
            crop: crop.to_string(),
        }
    }

    fn row(longitude: f64, latitude: f64, crop: Option<&str>) -> SampleRecord {
        SampleRecord::new(
            BlockCoordinate {
                longitude,
                latitude,
            },
            None,
            crop.map(ToString::to_string),
            None,
        )
    }

    #[test]
    fn fills_missing_crop_and_phenology() {
        let labels = label_index(&[block(-98.0, 27.0, "ONIONS"), block(-97.95, 27.0, "OKRA")]);
        let phenology = phenology_index(&[onions()]);
        let mut records = vec![
            row(-98.0, 27.0, None),
            row(-97.95, 27.0, None),
            row(-97.9, 27.0, None),
            row(-97.95, 26.95, Some("CABBAGE")),
        ];

        let report = repair_records(&mut records, &labels, &phenology);

        assert_eq!(
            report,
            RepairReport {
                rows: 4,
                filled: 2,
                unresolved: 1,
            }
        );
        assert_eq!(records[0].crop.as_deref(), Some("ONIONS"));
        assert_eq!(records[0].plant_month, Some(10));
        assert_eq!(records[0].growing_duration, Some(6));
        assert_eq!(records[1].crop.as_deref(), Some("OKRA"));
        assert_eq!(records[1].plant_month, None);
        assert_eq!(records[2].crop, None);
        assert_eq!(records[3].crop.as_deref(), Some("CABBAGE"));
    }

    #[test]
    fn negative_zero_matches_zero() {
        let labels = label_index(&[block(0.0, 27.0, "ONIONS")]);
        let mut records = vec![row(-0.0, 27.0, None)];
        let report = repair_records(&mut records, &labels, &PhenologyIndex::new());
        assert_eq!(report.filled, 1);
    }

    #[tokio::test]
    async fn repairs_file_into_new_location() {
        let dir = scratch_dir("repair_file");
        let raw = dir.join("Texas_Tiny_2020_1.csv");
        let repaired = dir.join("Texas_Tiny_data").join("Texas_Tiny_2020_1.csv");
        let policy = RetryPolicy::immediate(1);

        artifacts::write_samples(&policy, &raw, &[row(-98.0, 27.0, None)])
            .await
            .unwrap();

        let labels = label_index(&[block(-98.0, 27.0, "ONIONS")]);
        let phenology = phenology_index(&[onions()]);
        let report = repair_month_file(&policy, &raw, &repaired, &labels, &phenology)
            .await
            .unwrap();

        assert_eq!(report.filled, 1);
        let fixed = artifacts::read_samples(&repaired).unwrap();
        assert_eq!(fixed[0].crop.as_deref(), Some("ONIONS"));
        assert_eq!(artifacts::read_samples(&raw).unwrap()[0].crop, None);
        std::fs::remove_dir_all(&dir).ok();
    }
}
