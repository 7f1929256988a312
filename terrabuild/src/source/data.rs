//! Opened payloads bound to a source.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extents::GeospatialExtents;
use crate::raster::{RasterDataset, WarpService};
use crate::spatial::{CoordinateSystem, SpatialProperties};

/// Reference to an externally loaded 3-D model.
///
/// The engine only places models; the emitter resolves the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Display name, usually the file stem.
    pub name: String,
    /// Model file.
    pub path: PathBuf,
}

/// Data bound to a source once it has been loaded.
#[derive(Debug)]
pub enum SourceData {
    /// An opened raster.
    Raster(RasterData),
    /// A model placed by its extents.
    Model(ModelData),
}

/// A model payload.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub model: ModelRef,
    /// Extents in the destination coordinate system.
    pub extents: GeospatialExtents,
}

/// An opened raster with its native spatial properties and a cache of
/// properties computed for other coordinate systems.
pub struct RasterData {
    dataset: Arc<dyn RasterDataset>,
    has_gcps: bool,
    native: SpatialProperties,
    reprojected: HashMap<String, SpatialProperties>,
}

impl RasterData {
    /// Bind a dataset with already resolved native properties.
    pub fn new(dataset: Arc<dyn RasterDataset>, native: SpatialProperties) -> Self {
        let has_gcps = dataset.gcp_count() > 0;
        Self {
            dataset,
            has_gcps,
            native,
            reprojected: HashMap::new(),
        }
    }

    /// The opened raster.
    pub fn dataset(&self) -> &Arc<dyn RasterDataset> {
        &self.dataset
    }

    /// Whether the raster is georeferenced by ground control points.
    pub fn has_gcps(&self) -> bool {
        self.has_gcps
    }

    /// Spatial properties in the raster's own coordinate system.
    pub fn native(&self) -> &SpatialProperties {
        &self.native
    }

    /// Spatial properties as seen from `cs`.
    ///
    /// Returns the native properties when `cs` is equivalent to the native
    /// system, when the native system is unknown, or when no projected
    /// properties could be computed for `cs`.
    pub fn spatial_properties(&self, cs: &CoordinateSystem) -> &SpatialProperties {
        if self.is_native(cs) {
            return &self.native;
        }
        self.reprojected
            .get(&cs.cache_key())
            .unwrap_or(&self.native)
    }

    /// Compute and cache the spatial properties for `cs`.
    ///
    /// Uses the warp service's suggested output grid. If the service cannot
    /// transform between the two systems the native properties stay in use.
    pub fn prepare(&mut self, cs: &CoordinateSystem, warp: &dyn WarpService) {
        if self.is_native(cs) {
            return;
        }
        let key = cs.cache_key();
        if self.reprojected.contains_key(&key) {
            return;
        }
        let Some(native_cs) = self.native.cs.as_ref() else {
            return;
        };

        match warp.suggested_output(self.dataset.as_ref(), native_cs, cs) {
            Ok(output) => {
                let props = SpatialProperties::new(
                    output.pixels,
                    output.lines,
                    output.geo_transform,
                    Some(cs.clone()),
                );
                debug!(target_cs = %cs, extents = %props.extents, "Computed projected extents");
                self.reprojected.insert(key, props);
            }
            Err(e) => {
                debug!(target_cs = %cs, error = %e, "Using native extents");
            }
        }
    }

    fn is_native(&self, cs: &CoordinateSystem) -> bool {
        self.native
            .cs
            .as_ref()
            .map_or(true, |native| native.is_equivalent(cs))
    }
}

impl fmt::Debug for RasterData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterData")
            .field("size", &self.dataset.size())
            .field("bands", &self.dataset.band_count())
            .field("has_gcps", &self.has_gcps)
            .field("native", &self.native)
            .field("reprojected", &self.reprojected.len())
            .finish()
    }
}

impl SourceData {
    /// Extents as seen from `cs`.
    pub fn extents(&self, cs: &CoordinateSystem) -> GeospatialExtents {
        match self {
            SourceData::Raster(raster) => raster.spatial_properties(cs).extents,
            SourceData::Model(model) => model.extents,
        }
    }

    /// Spatial properties as seen from `cs`; models have none.
    pub fn spatial_properties(&self, cs: &CoordinateSystem) -> Option<&SpatialProperties> {
        match self {
            SourceData::Raster(raster) => Some(raster.spatial_properties(cs)),
            SourceData::Model(_) => None,
        }
    }

    /// The raster payload, if any.
    pub fn as_raster(&self) -> Option<&RasterData> {
        match self {
            SourceData::Raster(raster) => Some(raster),
            SourceData::Model(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{MemoryRaster, NoWarpService, WarpError, WarpOutput};
    use crate::spatial::GeoTransform;
    use std::path::Path;

    fn raster_data(cs: Option<&str>) -> RasterData {
        let raster = MemoryRaster::elevation(10, 10, vec![0.0; 100], GeoTransform::north_up(0.0, 10.0, 1.0, 1.0))
            .unwrap();
        let props = SpatialProperties::new(
            10,
            10,
            GeoTransform::north_up(0.0, 10.0, 1.0, 1.0),
            cs.map(CoordinateSystem::new),
        );
        RasterData::new(Arc::new(raster), props)
    }

    /// Warp service that reports a fixed, shifted output grid.
    struct ShiftingWarp;

    impl WarpService for ShiftingWarp {
        fn suggested_output(
            &self,
            _dataset: &dyn RasterDataset,
            _source_cs: &CoordinateSystem,
            _target_cs: &CoordinateSystem,
        ) -> Result<WarpOutput, WarpError> {
            Ok(WarpOutput {
                pixels: 20,
                lines: 20,
                geo_transform: GeoTransform::north_up(100.0, 200.0, 2.0, 2.0),
            })
        }

        fn warp(
            &self,
            _dataset: &dyn RasterDataset,
            _source_cs: &CoordinateSystem,
            _target_cs: &CoordinateSystem,
            _output: &WarpOutput,
            _path: &Path,
        ) -> Result<Arc<dyn RasterDataset>, WarpError> {
            Err(WarpError::SuggestedOutput("not used".to_string()))
        }
    }

    #[test]
    fn test_native_properties_for_equivalent_cs() {
        let data = raster_data(Some("EPSG:32632"));
        let props = data.spatial_properties(&CoordinateSystem::new("epsg:32632"));
        assert_eq!(props.extents.x_max, 10.0);
    }

    #[test]
    fn test_prepare_caches_projected_properties() {
        let mut data = raster_data(Some("EPSG:32632"));
        let wgs84 = CoordinateSystem::wgs84();
        data.prepare(&wgs84, &ShiftingWarp);

        let props = data.spatial_properties(&wgs84);
        assert_eq!(props.extents.x_min, 100.0);
        assert_eq!(props.extents.x_max, 140.0);
        assert!(props.extents.is_geographic);
        assert_eq!(data.native().extents.x_min, 0.0);
    }

    #[test]
    fn test_prepare_falls_back_to_native_on_failure() {
        let mut data = raster_data(Some("EPSG:32632"));
        let wgs84 = CoordinateSystem::wgs84();
        data.prepare(&wgs84, &NoWarpService);
        assert_eq!(data.spatial_properties(&wgs84).extents.x_max, 10.0);
    }

    #[test]
    fn test_unknown_native_cs_is_treated_as_target() {
        let mut data = raster_data(None);
        data.prepare(&CoordinateSystem::wgs84(), &ShiftingWarp);
        assert_eq!(
            data.spatial_properties(&CoordinateSystem::wgs84()).extents.x_min,
            0.0
        );
    }
}
