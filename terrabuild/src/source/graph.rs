//! The collection of sources feeding a build.

use std::cmp::Ordering;

use tracing::{info, warn};

use super::{Source, SourceType};
use crate::extents::GeospatialExtents;
use crate::raster::{RasterService, WarpService};
use crate::spatial::CoordinateSystem;

/// Ordered list of sources.
///
/// After [`sort_by_resolution`](Self::sort_by_resolution) the coarsest
/// source comes first, so finer sources are composited on top of it.
#[derive(Debug, Default)]
pub struct SourceGraph {
    sources: Vec<Source>,
}

impl SourceGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source.
    pub fn add(&mut self, source: Source) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Source> {
        self.sources.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Source> {
        self.sources.iter_mut()
    }

    /// Replace the source at `index`.
    pub fn replace(&mut self, index: usize, source: Source) {
        if let Some(slot) = self.sources.get_mut(index) {
            *slot = source;
        }
    }

    /// Load every source that is not loaded yet.
    ///
    /// Sources that cannot be opened are dropped with a warning. Returns
    /// the number of dropped sources.
    pub fn load_all(&mut self, service: &dyn RasterService) -> usize {
        let before = self.sources.len();
        self.sources.retain_mut(|source| {
            if source.is_loaded() {
                return true;
            }
            match source.load(service) {
                Ok(()) => true,
                Err(e) => {
                    warn!(source = %source.path().display(), error = %e, "Dropping unreadable source");
                    false
                }
            }
        });
        let dropped = before - self.sources.len();
        info!(loaded = self.sources.len(), dropped, "Loaded sources");
        dropped
    }

    /// Compute every source's spatial properties in `cs`.
    pub fn prepare(&mut self, cs: &CoordinateSystem, warp: &dyn WarpService) {
        for source in &mut self.sources {
            source.prepare(cs, warp);
        }
    }

    /// First coordinate system found on a raster source.
    pub fn first_coordinate_system(&self) -> Option<CoordinateSystem> {
        self.sources
            .iter()
            .find_map(|source| source.coordinate_system().cloned())
    }

    /// Union of all source extents as seen from `cs`.
    pub fn extents(&self, cs: &CoordinateSystem) -> GeospatialExtents {
        let mut extents = GeospatialExtents::empty();
        for source in &self.sources {
            if let Some(source_extents) = source.extents(cs) {
                extents = extents.union(&source_extents);
            }
        }
        extents.is_geographic = cs.is_geographic();
        extents
    }

    /// Number of imagery layers referenced by image sources.
    pub fn num_image_layers(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.source_type() == SourceType::Image)
            .map(|s| s.layer() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Refresh sort values and order sources coarsest first.
    ///
    /// The sort is stable, so sources of equal resolution keep their
    /// configured order.
    pub fn sort_by_resolution(&mut self) {
        for source in &mut self.sources {
            source.set_sort_value_from_resolution();
        }
        self.sources.sort_by(|a, b| {
            b.sort_value()
                .partial_cmp(&a.sort_value())
                .unwrap_or(Ordering::Equal)
        });
    }
}

impl<'a> IntoIterator for &'a SourceGraph {
    type Item = &'a Source;
    type IntoIter = std::slice::Iter<'a, Source>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

impl FromIterator<Source> for SourceGraph {
    fn from_iter<I: IntoIterator<Item = Source>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().collect(),
        }
    }
}
