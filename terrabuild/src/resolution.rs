//! Required-resolution accumulation.
//!
//! After the quadtree is built every tile knows the pixel spacing it will be
//! rendered at. Walking the tree and recording those spacings on each
//! source that overlaps the tile tells us which resolutions of the source
//! are actually needed. The raw list is then collapsed into a doubling
//! ladder:
//!
//! ```text
//! observed:   0.4   0.09   0.21
//! ladder:     0.09 ─► 0.18 ─► 0.36 ─► 0.72
//!             (min)                  (first step past the max)
//! ```

use serde::{Deserialize, Serialize};

use crate::config::DataSetConfig;
use crate::destination::DestinationTile;
use crate::source::{SourceGraph, SourceType};
use crate::spatial::CoordinateSystem;

/// A pixel spacing pair in destination units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub res_x: f64,
    pub res_y: f64,
}

impl Resolution {
    /// Create a resolution pair.
    pub fn new(res_x: f64, res_y: f64) -> Self {
        Self { res_x, res_y }
    }
}

/// Record the resolutions `tile` needs from every source overlapping it.
///
/// Image sources receive the tile's imagery sizing for the source's layer,
/// height-field sources the terrain sizing. Models need nothing.
pub fn add_required_resolutions(
    tile: &DestinationTile,
    sources: &mut SourceGraph,
    cs: &CoordinateSystem,
    config: &DataSetConfig,
) {
    for source in sources.iter_mut() {
        if !source.intersects(&tile.extents, cs) {
            continue;
        }

        let sizing = match source.source_type() {
            SourceType::Image => tile.image_sizing(source.layer(), config),
            SourceType::HeightField => tile.terrain_sizing(config),
            SourceType::Model => None,
        };

        if let Some(sizing) = sizing {
            source.add_required_resolution(Resolution::new(sizing.res_x, sizing.res_y));
        }
    }
}

/// Collapse a list of resolutions into a doubling ladder.
///
/// The ladder starts at the per-axis minimum and doubles both axes in lock
/// step until both maxima are reached or passed. Lists with at most one
/// entry are returned unchanged.
///
/// # Example
///
/// ```
/// use terrabuild::resolution::{consolidate, Resolution};
///
/// let observed = [0.4, 0.09, 0.21].map(|r| Resolution::new(r, r));
/// let ladder: Vec<f64> = consolidate(&observed).iter().map(|r| r.res_x).collect();
///
/// assert_eq!(ladder.len(), 4);
/// assert!((ladder[3] - 0.72).abs() < 1e-12);
/// ```
pub fn consolidate(resolutions: &[Resolution]) -> Vec<Resolution> {
    if resolutions.len() <= 1 {
        return resolutions.to_vec();
    }

    let first = resolutions[0];
    let (min, max) = resolutions.iter().skip(1).fold(
        (first, first),
        |(min, max), r| {
            (
                Resolution::new(min.res_x.min(r.res_x), min.res_y.min(r.res_y)),
                Resolution::new(max.res_x.max(r.res_x), max.res_y.max(r.res_y)),
            )
        },
    );

    // Degenerate input would never terminate the doubling loop.
    if !(min.res_x > 0.0 && min.res_y > 0.0 && max.res_x.is_finite() && max.res_y.is_finite()) {
        return vec![min];
    }

    let mut ladder = vec![min];
    let mut current = min;
    while current.res_x < max.res_x || current.res_y < max.res_y {
        current = Resolution::new(current.res_x * 2.0, current.res_y * 2.0);
        ladder.push(current);
    }
    ladder
}
