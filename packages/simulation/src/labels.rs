//! Production-weighted crop label simulation.
//!
//! Each crop receives `floor(share * N)` labels, where `share` is its part
//! of total production. Crops whose share is below the minimum ratio are
//! dropped outright rather than rounded up, and never reappear as padding.
//! Any shortfall left by flooring is padded with one label per remaining
//! crop in listing order, so the sequence may still end up shorter than
//! `N`; positional lookups therefore wrap around via [`label_for`].

use agrisynth_dataset_models::{CropProductionTable, GeoPoint, LabeledBlock};

use crate::SimulationError;

/// Crops below this share of total production receive no labels.
pub const DEFAULT_MIN_RATIO: f64 = 0.01;

/// Builds the label sequence for `total_blocks` grid blocks.
///
/// The returned sequence has at most `total_blocks` entries. Labels appear
/// grouped by crop, in the table's order, followed by the padding labels.
///
/// # Errors
///
/// Returns [`SimulationError::InvalidProductionData`] if the total
/// production (excluding totals rows) is not positive and finite, or if any
/// crop has a negative or non-finite production.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn simulate_crop_distribution(
    productions: &CropProductionTable,
    total_blocks: usize,
    min_ratio: f64,
) -> Result<Vec<String>, SimulationError> {
    if let Some(bad) = productions
        .crops()
        .find(|e| !e.production.is_finite() || e.production < 0.0)
    {
        return Err(SimulationError::InvalidProductionData {
            message: format!("{} has production {}", bad.crop, bad.production),
        });
    }

    let total_production = productions.total_production();
    if !total_production.is_finite() || total_production <= 0.0 {
        return Err(SimulationError::InvalidProductionData {
            message: format!("total production is {total_production}"),
        });
    }

    let mut labels = Vec::with_capacity(total_blocks);
    let mut kept: Vec<&str> = Vec::new();

    for entry in productions.crops() {
        let proportion = entry.production / total_production;
        if proportion < min_ratio {
            log::debug!(
                "Dropping {} ({:.2}% of production is below the {:.2}% minimum)",
                entry.crop,
                proportion * 100.0,
                min_ratio * 100.0
            );
            continue;
        }

        let blocks_for_crop = (proportion * total_blocks as f64).floor() as usize;
        labels.extend(std::iter::repeat_n(entry.crop.clone(), blocks_for_crop));
        kept.push(&entry.crop);
    }

    let remaining = total_blocks.saturating_sub(labels.len());
    if remaining > 0 {
        let padding: Vec<String> = kept
            .iter()
            .take(remaining)
            .map(|crop| (*crop).to_string())
            .collect();
        if padding.len() < remaining {
            log::debug!(
                "Label sequence is {} short of {total_blocks} blocks; positions will wrap",
                remaining - padding.len()
            );
        }
        labels.extend(padding);
    }

    Ok(labels)
}

/// Returns the label for grid position `index`, wrapping around when the
/// sequence is shorter than the grid.
#[must_use]
pub fn label_for(labels: &[String], index: usize) -> Option<&str> {
    if labels.is_empty() {
        return None;
    }
    Some(labels[index % labels.len()].as_str())
}

/// Pairs each grid point with its positional label.
///
/// # Errors
///
/// Returns [`SimulationError::EmptyLabels`] if `labels` is empty while
/// `points` is not.
pub fn assign_labels(
    points: &[GeoPoint],
    labels: &[String],
) -> Result<Vec<LabeledBlock>, SimulationError> {
    if labels.is_empty() && !points.is_empty() {
        return Err(SimulationError::EmptyLabels {
            points: points.len(),
        });
    }

    Ok(points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            label_for(labels, i).map(|crop| LabeledBlock {
                longitude: p.longitude,
                latitude: p.latitude,
                crop: crop.to_string(),
            })
        })
        .collect())
}

/// Counts labels per crop, in order of first appearance.
#[must_use]
pub fn label_counts(labels: &[String]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in labels {
        if let Some((_, n)) = counts.iter_mut().find(|(c, _)| c == label) {
            *n += 1;
        } else {
            counts.push((label.clone(), 1));
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, f64)]) -> CropProductionTable {
        entries.iter().map(|(c, p)| (*c, *p)).collect()
    }

    fn count(labels: &[String], crop: &str) -> usize {
        labels.iter().filter(|l| *l == crop).count()
    }

    #[test]
    fn excludes_totals_and_pads_in_listing_order() {
        let productions = table(&[("CORN", 70.0), ("BEANS", 25.0), ("TOTALS", 95.0)]);
        let labels = simulate_crop_distribution(&productions, 10, DEFAULT_MIN_RATIO).unwrap();

        assert_eq!(labels.len(), 10);
        assert_eq!(count(&labels, "CORN"), 8);
        assert_eq!(count(&labels, "BEANS"), 2);
        assert_eq!(count(&labels, "TOTALS"), 0);
        assert_eq!(&labels[..7], vec!["CORN"; 7].as_slice());
        assert_eq!(&labels[7..9], vec!["BEANS"; 2].as_slice());
        assert_eq!(labels[9], "CORN");
    }

    #[test]
    fn crops_below_min_ratio_never_appear() {
        let productions = table(&[("ONIONS", 995.0), ("OKRA", 5.0)]);
        let labels = simulate_crop_distribution(&productions, 1000, DEFAULT_MIN_RATIO).unwrap();

        // 995 proportional labels plus one padding label for ONIONS.
        assert_eq!(labels.len(), 996);
        assert_eq!(count(&labels, "OKRA"), 0);
    }

    #[test]
    fn padding_adds_one_label_per_kept_crop() {
        let productions = table(&[("A", 1.0), ("B", 1.0), ("C", 1.0)]);
        let labels = simulate_crop_distribution(&productions, 100, DEFAULT_MIN_RATIO).unwrap();

        // 3 x floor(33.3) = 99, then one padding label.
        assert_eq!(labels.len(), 100);
        assert_eq!(labels[99], "A");

        let labels = simulate_crop_distribution(&productions, 2, DEFAULT_MIN_RATIO).unwrap();
        // Every crop floors to zero; padding adds one label per crop up to N.
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[test]
    fn sequence_stays_short_when_padding_runs_out() {
        let mut entries = vec![("MAIN".to_string(), 90.0)];
        entries.extend((0..20).map(|i| (format!("MINOR {i}"), 0.5)));
        let productions: CropProductionTable = entries.into_iter().collect();

        let labels = simulate_crop_distribution(&productions, 100, DEFAULT_MIN_RATIO).unwrap();
        assert_eq!(labels.len(), 91);
        assert!(labels.iter().all(|l| l == "MAIN"));
    }

    #[test]
    fn everything_below_min_ratio_yields_no_labels() {
        let productions = table(&[("A", 1.0), ("B", 1.0)]);
        let labels = simulate_crop_distribution(&productions, 7, 0.6).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn every_qualifying_crop_meets_its_floor() {
        let productions = table(&[
            ("ONIONS", 4_120.0),
            ("CABBAGE", 1_975.0),
            ("CANTALOUPES", 611.0),
            ("WATERMELONS", 377.0),
            ("OKRA", 12.0),
            ("VEGETABLE TOTALS", 7_095.0),
        ]);
        let total = productions.total_production();

        for n in [1_usize, 7, 64, 333, 1_000] {
            let labels = simulate_crop_distribution(&productions, n, DEFAULT_MIN_RATIO).unwrap();
            assert!(labels.len() <= n);
            for entry in productions.crops() {
                let share = entry.production / total;
                if share >= DEFAULT_MIN_RATIO {
                    #[allow(
                        clippy::cast_possible_truncation,
                        clippy::cast_sign_loss,
                        clippy::cast_precision_loss
                    )]
                    let floor = (share * n as f64).floor() as usize;
                    assert!(count(&labels, &entry.crop) >= floor);
                }
            }
        }
    }

    #[test]
    fn zero_total_production_is_rejected() {
        let productions = table(&[("CORN", 0.0), ("TOTALS", 10.0)]);
        assert!(matches!(
            simulate_crop_distribution(&productions, 10, DEFAULT_MIN_RATIO),
            Err(SimulationError::InvalidProductionData { .. })
        ));
        assert!(matches!(
            simulate_crop_distribution(&CropProductionTable::new(), 10, DEFAULT_MIN_RATIO),
            Err(SimulationError::InvalidProductionData { .. })
        ));
    }

    #[test]
    fn negative_production_is_rejected() {
        let productions = table(&[("CORN", 10.0), ("BEANS", -1.0)]);
        assert!(matches!(
            simulate_crop_distribution(&productions, 10, DEFAULT_MIN_RATIO),
            Err(SimulationError::InvalidProductionData { .. })
        ));
    }

    #[test]
    fn labels_wrap_around_short_sequences() {
        let labels = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(label_for(&labels, 0), Some("A"));
        assert_eq!(label_for(&labels, 4), Some("B"));
        assert_eq!(label_for(&[], 4), None);

        let points: Vec<GeoPoint> = (0..5)
            .map(|i| GeoPoint::new(27.0, -98.0 + f64::from(i) * 0.01))
            .collect();
        let blocks = assign_labels(&points, &labels).unwrap();
        let crops: Vec<&str> = blocks.iter().map(|b| b.crop.as_str()).collect();
        assert_eq!(crops, vec!["A", "B", "C", "A", "B"]);
        assert_eq!(blocks[3].key(), points[3].key());
    }

    #[test]
    fn assigning_empty_labels_fails() {
        let points = vec![GeoPoint::new(27.0, -98.0)];
        assert!(matches!(
            assign_labels(&points, &[]),
            Err(SimulationError::EmptyLabels { points: 1 })
        ));
        assert!(assign_labels(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn counts_labels_in_first_seen_order() {
        let labels: Vec<String> = ["B", "A", "B"].iter().map(ToString::to_string).collect();
        assert_eq!(
            label_counts(&labels),
            vec![("B".to_string(), 2), ("A".to_string(), 1)]
        );
    }
}
