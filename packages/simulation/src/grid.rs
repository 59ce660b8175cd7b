//! Geodesic grid partitioning of a rectangular region.
//!
//! The block counts come from true geodesic extents (WGS84 ellipsoid), but
//! the lattice itself uses equal *angular* steps between the corners. At
//! county scale the difference from an equal-area tiling is negligible, and
//! downstream consumers depend on exactly this construction, so it must not
//! be "corrected".

use agrisynth_dataset_models::{GeoPoint, Roi};
use geo::{Distance as _, Geodesic, Point};

use crate::SimulationError;

/// The lattice layout derived from a region and a block side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    /// Northwest corner; the first emitted point.
    pub origin: GeoPoint,
    /// Number of rows, north to south.
    pub num_lat_blocks: usize,
    /// Number of columns, west to east.
    pub num_lon_blocks: usize,
    /// Degrees of latitude between rows (positive).
    pub lat_step: f64,
    /// Degrees of longitude between columns (positive).
    pub lon_step: f64,
    /// Geodesic north-south extent in meters.
    pub north_south_m: f64,
    /// Geodesic east-west extent along the northern edge in meters.
    pub east_west_m: f64,
}

impl GridLayout {
    /// Computes the layout for `roi` with square blocks of `block_side_m`
    /// meters.
    ///
    /// # Errors
    ///
    /// * [`SimulationError::InvalidBlockSide`] if the block side is not a
    ///   positive, finite number.
    /// * [`SimulationError::InvalidRegion`] if the corners are out of range or
    ///   `top_left` is not northwest of `bottom_right`.
    /// * [`SimulationError::DegenerateRegion`] if the region does not fit a
    ///   single block in either dimension.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(roi: &Roi, block_side_m: f64) -> Result<Self, SimulationError> {
        if !block_side_m.is_finite() || block_side_m <= 0.0 {
            return Err(SimulationError::InvalidBlockSide { block_side_m });
        }
        validate_roi(roi)?;

        let (lat, lon) = (roi.top_left.latitude, roi.top_left.longitude);
        let (end_lat, end_lon) = (roi.bottom_right.latitude, roi.bottom_right.longitude);

        let north_south_m = Geodesic.distance(Point::new(lon, lat), Point::new(lon, end_lat));
        let east_west_m = Geodesic.distance(Point::new(lon, lat), Point::new(end_lon, lat));

        let num_lat_blocks = (north_south_m / block_side_m).floor() as usize;
        let num_lon_blocks = (east_west_m / block_side_m).floor() as usize;

        if num_lat_blocks == 0 || num_lon_blocks == 0 {
            return Err(SimulationError::DegenerateRegion {
                north_south_m,
                east_west_m,
                block_side_m,
            });
        }

        let lat_step = (lat - end_lat) / num_lat_blocks as f64;
        let lon_step = (end_lon - lon) / num_lon_blocks as f64;

        log::debug!(
            "Grid {num_lat_blocks}x{num_lon_blocks} over {north_south_m:.1} m x \
             {east_west_m:.1} m (steps {lat_step} deg lat, {lon_step} deg lon)"
        );

        Ok(Self {
            origin: roi.top_left,
            num_lat_blocks,
            num_lon_blocks,
            lat_step,
            lon_step,
            north_south_m,
            east_west_m,
        })
    }

    /// Total number of grid points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.num_lat_blocks * self.num_lon_blocks
    }

    /// Always `false`: a constructed layout has at least one block.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point at row `i`, column `j`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn point(&self, i: usize, j: usize) -> GeoPoint {
        GeoPoint::new(
            self.origin.latitude - i as f64 * self.lat_step,
            self.origin.longitude + j as f64 * self.lon_step,
        )
    }

    /// Iterates over all points row by row: north to south, and west to
    /// east within a row.
    ///
    /// Labels are assigned by position in this sequence, so the order is
    /// part of the output contract.
    pub fn points(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        (0..self.num_lat_blocks)
            .flat_map(move |i| (0..self.num_lon_blocks).map(move |j| self.point(i, j)))
    }
}

/// Divides `roi` into blocks of `block_side_m` meters and returns the
/// northwest corner of every block in row-major order.
///
/// # Errors
///
/// See [`GridLayout::new`].
pub fn partition_roi(roi: &Roi, block_side_m: f64) -> Result<Vec<GeoPoint>, SimulationError> {
    let layout = GridLayout::new(roi, block_side_m)?;
    Ok(layout.points().collect())
}

fn validate_roi(roi: &Roi) -> Result<(), SimulationError> {
    for (name, p) in [("top_left", roi.top_left), ("bottom_right", roi.bottom_right)] {
        if !(-90.0..=90.0).contains(&p.latitude) || !(-180.0..=180.0).contains(&p.longitude) {
            return Err(SimulationError::InvalidRegion {
                message: format!(
                    "{name} ({}, {}) is not a valid latitude/longitude",
                    p.latitude, p.longitude
                ),
            });
        }
    }

    if !roi.is_northwest_ordered() {
        return Err(SimulationError::InvalidRegion {
            message: format!(
                "top_left ({}, {}) must be north-west of bottom_right ({}, {})",
                roi.top_left.latitude,
                roi.top_left.longitude,
                roi.bottom_right.latitude,
                roi.bottom_right.longitude
            ),
        });
    }

    Ok(())
}
