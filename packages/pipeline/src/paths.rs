#![allow(clippy::module_name_repetitions)]
//! Canonical artifact paths.
//!
//! All paths are relative to the run's output directory and named after
//! the location's `State_County` name, so separate counties never clash.

use std::path::{Path, PathBuf};

/// Grid-and-label CSV written by the crops step.
#[must_use]
pub fn labels_csv_path(output_dir: &Path, year: i32, location_name: &str) -> PathBuf {
    output_dir.join(format!("{year}_crops_{location_name}.csv"))
}

/// Block-coordinate JSON written by the crops step.
#[must_use]
pub fn block_coordinates_path(output_dir: &Path, location_name: &str) -> PathBuf {
    output_dir.join(format!("{location_name}_block_coordinates.json"))
}

/// Default phenology JSON location.
#[must_use]
pub fn phenology_path(output_dir: &Path, location_name: &str) -> PathBuf {
    output_dir.join(format!("{location_name}_crop_analysis.json"))
}

/// Raw per-month CSV, before repair.
#[must_use]
pub fn month_csv_path(output_dir: &Path, location_name: &str, year: i32, month: u32) -> PathBuf {
    output_dir.join(month_file_name(location_name, year, month))
}

/// Directory holding the repaired per-month CSVs.
#[must_use]
pub fn repaired_dir(output_dir: &Path, location_name: &str) -> PathBuf {
    output_dir.join(format!("{location_name}_data"))
}

/// Repaired per-month CSV.
#[must_use]
pub fn repaired_month_csv_path(
    output_dir: &Path,
    location_name: &str,
    year: i32,
    month: u32,
) -> PathBuf {
    repaired_dir(output_dir, location_name).join(month_file_name(location_name, year, month))
}

fn month_file_name(location_name: &str, year: i32, month: u32) -> String {
    format!("{location_name}_{year}_{month}.csv")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names() {
        let out = Path::new("data");
        assert_eq!(
            labels_csv_path(out, 2020, "Texas_Willacy"),
            Path::new("data/2020_crops_Texas_Willacy.csv")
        );
        assert_eq!(
            block_coordinates_path(out, "Texas_Willacy"),
            Path::new("data/Texas_Willacy_block_coordinates.json")
        );
        assert_eq!(
            phenology_path(out, "Texas_Willacy"),
            Path::new("data/Texas_Willacy_crop_analysis.json")
        );
        assert_eq!(
            month_csv_path(out, "Texas_Willacy", 2020, 3),
            Path::new("data/Texas_Willacy_2020_3.csv")
        );
        assert_eq!(
            repaired_month_csv_path(out, "Texas_Willacy", 2020, 12),
            Path::new("data/Texas_Willacy_data/Texas_Willacy_2020_12.csv")
        );
    }
}
