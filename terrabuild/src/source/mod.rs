//! Input sources.
//!
//! A [`Source`] describes one configured input: what kind of data it holds,
//! where it lives, which quadtree levels it contributes to, and how its
//! coordinate system and geotransform are resolved. Loading binds a
//! [`SourceData`] payload to it.
//!
//! # Parameter Policies
//!
//! Raster files often carry georeferencing of their own. A source can be
//! configured to prefer the file's metadata or the configured values:
//!
//! | Policy | Coordinate system | Geotransform |
//! |--------|-------------------|--------------|
//! | `PreferFileSettings` | file, else configured | file, else configured |
//! | `PreferConfigSettings` | configured, else file | configured, else file |
//! | `PreferConfigSettingsButScaleByFileResolution` | configured, else file | configured, divided by `size - 1` per axis |
//!
//! # Reprojection
//!
//! [`Source::need_reproject`] decides whether a source must be warped into
//! the destination coordinate system; [`Source::do_reproject`] performs the
//! warp through a [`WarpService`] and returns the replacement source.

mod data;
mod graph;

pub use data::{ModelData, ModelRef, RasterData, SourceData};
pub use graph::SourceGraph;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::extents::GeospatialExtents;
use crate::raster::{RasterDataset, RasterError, RasterService, WarpError, WarpService};
use crate::resolution::Resolution;
use crate::spatial::{CoordinateSystem, GeoTransform, SpatialProperties};

/// Kind of data a source contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Colour imagery drawn into a texture layer.
    Image,
    /// Elevation samples drawn into the terrain height field.
    HeightField,
    /// A discrete 3-D model attached to overlapping tiles.
    Model,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Image => write!(f, "image"),
            SourceType::HeightField => write!(f, "height field"),
            SourceType::Model => write!(f, "model"),
        }
    }
}

/// Which of file metadata and configured values wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParameterPolicy {
    #[default]
    PreferFileSettings,
    PreferConfigSettings,
    /// Geotransforms only: the configured transform spans the whole raster
    /// and is divided by `num_values - 1` per axis.
    PreferConfigSettingsButScaleByFileResolution,
}

/// One configured input.
#[derive(Debug)]
pub struct Source {
    source_type: SourceType,
    path: PathBuf,
    data: Option<SourceData>,
    cs_policy: ParameterPolicy,
    geo_transform_policy: ParameterPolicy,
    configured_cs: Option<CoordinateSystem>,
    configured_geo_transform: Option<GeoTransform>,
    min_level: u32,
    max_level: u32,
    layer: usize,
    required_resolutions: Vec<Resolution>,
    sort_value: f64,
}

impl Source {
    /// Describe a raster source at `path`. Nothing is opened yet.
    pub fn new(source_type: SourceType, path: impl Into<PathBuf>) -> Self {
        Self {
            source_type,
            path: path.into(),
            data: None,
            cs_policy: ParameterPolicy::default(),
            geo_transform_policy: ParameterPolicy::default(),
            configured_cs: None,
            configured_geo_transform: None,
            min_level: 0,
            max_level: u32::MAX,
            layer: 0,
            required_resolutions: Vec::new(),
            sort_value: 0.0,
        }
    }

    /// An imagery source.
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self::new(SourceType::Image, path)
    }

    /// An elevation source.
    pub fn height_field(path: impl Into<PathBuf>) -> Self {
        Self::new(SourceType::HeightField, path)
    }

    /// A model placed at `extents` in the destination coordinate system.
    pub fn model(path: impl Into<PathBuf>, extents: GeospatialExtents) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut source = Self::new(SourceType::Model, path.clone());
        source.data = Some(SourceData::Model(ModelData {
            model: ModelRef { name, path },
            extents,
        }));
        source
    }

    /// Restrict contribution to levels `min_level..=max_level`.
    pub fn with_level_range(mut self, min_level: u32, max_level: u32) -> Self {
        self.min_level = min_level;
        self.max_level = max_level;
        self
    }

    /// Texture layer for imagery sources.
    pub fn with_layer(mut self, layer: usize) -> Self {
        self.layer = layer;
        self
    }

    /// Configure a coordinate system and the policy deciding its use.
    pub fn with_coordinate_system(mut self, cs: CoordinateSystem, policy: ParameterPolicy) -> Self {
        self.configured_cs = Some(cs);
        self.cs_policy = policy;
        self
    }

    /// Configure a geotransform and the policy deciding its use.
    pub fn with_geo_transform(mut self, geo_transform: GeoTransform, policy: ParameterPolicy) -> Self {
        self.configured_geo_transform = Some(geo_transform);
        self.geo_transform_policy = policy;
        self
    }

    /// Bind an already opened dataset, applying the parameter policies.
    pub fn with_dataset(mut self, dataset: Arc<dyn RasterDataset>) -> Self {
        self.attach_dataset(dataset);
        self
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> Option<&SourceData> {
        self.data.as_ref()
    }

    pub fn min_level(&self) -> u32 {
        self.min_level
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn sort_value(&self) -> f64 {
        self.sort_value
    }

    pub fn required_resolutions(&self) -> &[Resolution] {
        &self.required_resolutions
    }

    /// Returns true if the source contributes to tiles at `level`.
    pub fn is_level_eligible(&self, level: u32) -> bool {
        self.min_level <= level && level <= self.max_level
    }

    /// Returns true once a payload is bound.
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Coordinate system the loaded data is georeferenced in.
    pub fn coordinate_system(&self) -> Option<&CoordinateSystem> {
        match self.data.as_ref()? {
            SourceData::Raster(raster) => raster.native().cs.as_ref(),
            SourceData::Model(_) => None,
        }
    }

    /// Extents as seen from `cs`; `None` until loaded.
    pub fn extents(&self, cs: &CoordinateSystem) -> Option<GeospatialExtents> {
        self.data.as_ref().map(|data| data.extents(cs))
    }

    /// Returns true if the source overlaps `extents`, trying date line
    /// offsets for geographic data.
    pub fn intersects(&self, extents: &GeospatialExtents, cs: &CoordinateSystem) -> bool {
        self.extents(cs)
            .is_some_and(|source_extents| extents.intersects_wrapped(&source_extents))
    }

    /// Pixel spacing `(width / num_values_x, height / num_values_y)` in `cs`.
    pub fn resolution(&self, cs: &CoordinateSystem) -> Option<(f64, f64)> {
        let props = self.data.as_ref()?.spatial_properties(cs)?;
        if props.num_values_x == 0 || props.num_values_y == 0 {
            return None;
        }
        Some((props.resolution_x(), props.resolution_y()))
    }

    /// Append a resolution requested by a tile.
    pub fn add_required_resolution(&mut self, resolution: Resolution) {
        self.required_resolutions.push(resolution);
    }

    /// Replace the required resolutions with their doubling ladder.
    pub fn consolidate_required_resolutions(&mut self) {
        self.required_resolutions = crate::resolution::consolidate(&self.required_resolutions);
    }

    /// Open the raster through `service` and bind it.
    ///
    /// Models carry their payload from construction and are left as is.
    pub fn load(&mut self, service: &dyn RasterService) -> Result<(), RasterError> {
        if self.source_type == SourceType::Model && self.data.is_some() {
            return Ok(());
        }
        let dataset = service.open(&self.path)?;
        self.attach_dataset(dataset);
        Ok(())
    }

    /// Compute and cache the spatial properties for `cs`.
    pub fn prepare(&mut self, cs: &CoordinateSystem, warp: &dyn WarpService) {
        if let Some(SourceData::Raster(raster)) = self.data.as_mut() {
            raster.prepare(cs, warp);
        }
    }

    /// Set the sort value from the native diagonal pixel spacing.
    ///
    /// Spacing is measured between sample centres, `extent / (n - 1)`.
    pub fn set_sort_value_from_resolution(&mut self) {
        if let Some(SourceData::Raster(raster)) = &self.data {
            let props = raster.native();
            let dx = props.extents.width() / (props.num_values_x.max(2) - 1) as f64;
            let dy = props.extents.height() / (props.num_values_y.max(2) - 1) as f64;
            self.sort_value = (dx * dx + dy * dy).sqrt();
        }
    }

    /// Decide whether this source must be reprojected into `cs`.
    ///
    /// In order:
    /// 1. models never are
    /// 2. rasters with ground control points always are
    /// 3. rasters in a non-equivalent coordinate system are
    /// 4. with `min_resolution == max_resolution == 0` nothing else is checked,
    ///    otherwise rasters whose native resolution lies outside
    ///    `[min_resolution, max_resolution]` are
    pub fn need_reproject(&self, cs: &CoordinateSystem, min_resolution: f64, max_resolution: f64) -> bool {
        let Some(SourceData::Raster(raster)) = &self.data else {
            return false;
        };

        if raster.has_gcps() {
            debug!(source = %self.path.display(), "Reprojection required by ground control points");
            return true;
        }

        if let Some(native_cs) = &raster.native().cs {
            if !native_cs.is_equivalent(cs) {
                debug!(source = %self.path.display(), from = %native_cs, to = %cs, "Reprojection required by coordinate system");
                return true;
            }
        }

        if min_resolution == 0.0 && max_resolution == 0.0 {
            return false;
        }

        let current = raster.native().geo_transform.resolution();
        current < min_resolution || current > max_resolution
    }

    /// Warp this source into `cs`, writing the result to `path`.
    ///
    /// With `target_resolution > 0` the suggested output grid is rescaled so
    /// its pixel spacing matches the target while covering the same extent.
    /// The returned source inherits type, level range, layer and required
    /// resolutions, and prefers the warped file's own metadata.
    pub fn do_reproject(
        &self,
        path: &Path,
        cs: &CoordinateSystem,
        target_resolution: f64,
        warp: &dyn WarpService,
    ) -> Result<Source, WarpError> {
        let raster = match &self.data {
            Some(SourceData::Raster(raster)) => raster,
            _ => {
                return Err(WarpError::SuggestedOutput(format!(
                    "{} has no raster data",
                    self.path.display()
                )))
            }
        };

        let source_cs = raster
            .native()
            .cs
            .clone()
            .ok_or_else(|| WarpError::TransformerCreation {
                source_cs: "<undefined>".to_string(),
                target_cs: cs.to_string(),
            })?;

        let dataset = raster.dataset().as_ref();
        let mut output = warp.suggested_output(dataset, &source_cs, cs)?;

        if target_resolution > 0.0 {
            let t = output.geo_transform;
            let current = t.resolution();
            let extent_pixels = t.pixel_size_x() * output.pixels.saturating_sub(1) as f64;
            let extent_lines = t.pixel_size_y() * output.lines.saturating_sub(1) as f64;

            output.geo_transform = t.scaled(target_resolution / current);
            output.pixels = (extent_pixels / output.geo_transform.pixel_size_x()).ceil() as u32 + 1;
            output.lines = (extent_lines / output.geo_transform.pixel_size_y()).ceil() as u32 + 1;

            debug!(
                source = %self.path.display(),
                target_resolution,
                pixels = output.pixels,
                lines = output.lines,
                "Rescaled warp output"
            );
        }

        let warped = warp.warp(dataset, &source_cs, cs, &output, path)?;

        let mut source = Source::new(self.source_type, path)
            .with_level_range(self.min_level, self.max_level)
            .with_layer(self.layer);
        source.configured_cs = Some(cs.clone());
        source.required_resolutions = self.required_resolutions.clone();
        source.attach_dataset(warped);
        Ok(source)
    }

    fn attach_dataset(&mut self, dataset: Arc<dyn RasterDataset>) {
        let file_cs = dataset
            .projection()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| dataset.gcp_projection().filter(|p| !p.trim().is_empty()))
            .map(CoordinateSystem::new);

        let cs = match self.cs_policy {
            ParameterPolicy::PreferFileSettings => file_cs.or_else(|| self.configured_cs.clone()),
            _ => self.configured_cs.clone().or(file_cs),
        };

        let (num_x, num_y) = dataset.size();
        let file_transform = dataset.geo_transform();
        let geo_transform = match self.geo_transform_policy {
            ParameterPolicy::PreferFileSettings => file_transform.or(self.configured_geo_transform),
            ParameterPolicy::PreferConfigSettings => self.configured_geo_transform.or(file_transform),
            ParameterPolicy::PreferConfigSettingsButScaleByFileResolution => self
                .configured_geo_transform
                .map(|t| {
                    t.divided_per_axis(
                        num_x.saturating_sub(1).max(1) as f64,
                        num_y.saturating_sub(1).max(1) as f64,
                    )
                })
                .or(file_transform),
        };

        let geo_transform = geo_transform.unwrap_or_else(|| {
            warn!(source = %self.path.display(), "No geotransform, using pixel coordinates");
            GeoTransform::identity()
        });

        if cs.is_none() {
            warn!(source = %self.path.display(), "No coordinate system, assuming destination system");
        }

        let native = SpatialProperties::new(num_x, num_y, geo_transform, cs);
        debug!(
            source = %self.path.display(),
            source_type = %self.source_type,
            extents = %native.extents,
            "Bound source data"
        );
        self.data = Some(SourceData::Raster(RasterData::new(dataset, native)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{GridResampleWarpService, MemoryRaster, NoWarpService};

    fn dem(width: u32, height: u32, pixel: f64) -> Arc<dyn RasterDataset> {
        Arc::new(
            MemoryRaster::elevation(
                width,
                height,
                vec![0.0; (width * height) as usize],
                GeoTransform::north_up(0.0, height as f64 * pixel, pixel, pixel),
            )
            .unwrap()
            .with_projection("EPSG:32632"),
        )
    }

    fn utm() -> CoordinateSystem {
        CoordinateSystem::new("EPSG:32632")
    }

    // ─── parameter policies ─────────────────────────────────────────────

    #[test]
    fn test_prefer_file_settings() {
        let source = Source::height_field("dem.tif")
            .with_coordinate_system(CoordinateSystem::wgs84(), ParameterPolicy::PreferFileSettings)
            .with_dataset(dem(10, 10, 1.0));
        assert_eq!(source.coordinate_system(), Some(&utm()));
    }

    #[test]
    fn test_prefer_config_settings() {
        let source = Source::height_field("dem.tif")
            .with_coordinate_system(CoordinateSystem::wgs84(), ParameterPolicy::PreferConfigSettings)
            .with_geo_transform(
                GeoTransform::north_up(0.0, 50.0, 5.0, 5.0),
                ParameterPolicy::PreferConfigSettings,
            )
            .with_dataset(dem(10, 10, 1.0));
        assert!(source.coordinate_system().unwrap().is_geographic());
        assert_eq!(source.extents(&CoordinateSystem::wgs84()).unwrap().x_max, 50.0);
    }

    #[test]
    fn test_config_transform_scaled_by_file_resolution() {
        // Configured transform spans the whole raster: 100 units over 11 samples.
        let source = Source::height_field("dem.tif")
            .with_geo_transform(
                GeoTransform::north_up(0.0, 100.0, 100.0, 100.0),
                ParameterPolicy::PreferConfigSettingsButScaleByFileResolution,
            )
            .with_dataset(dem(11, 11, 1.0));
        let props = source.data().unwrap().spatial_properties(&utm()).unwrap();
        assert_eq!(props.geo_transform.pixel_size_x(), 10.0);
    }

    // ─── reprojection decision ──────────────────────────────────────────

    #[test]
    fn test_models_never_reproject() {
        let source = Source::model("house.osg", GeospatialExtents::new(0.0, 0.0, 1.0, 1.0, false));
        assert!(!source.need_reproject(&CoordinateSystem::wgs84(), 0.0, 0.0));
    }

    #[test]
    fn test_gcps_always_reproject() {
        let raster = MemoryRaster::elevation(2, 2, vec![0.0; 4], GeoTransform::identity())
            .unwrap()
            .with_projection("EPSG:32632")
            .with_gcps(4, "EPSG:32632");
        let source = Source::image("scan.tif").with_dataset(Arc::new(raster));
        assert!(source.need_reproject(&utm(), 0.0, 0.0));
    }

    #[test]
    fn test_different_cs_reprojects() {
        let source = Source::height_field("dem.tif").with_dataset(dem(10, 10, 1.0));
        assert!(source.need_reproject(&CoordinateSystem::wgs84(), 0.0, 0.0));
        assert!(!source.need_reproject(&utm(), 0.0, 0.0));
    }

    #[test]
    fn test_resolution_range() {
        let source = Source::height_field("dem.tif").with_dataset(dem(10, 10, 1.0));
        // Native resolution is sqrt(1 + 1).
        assert!(!source.need_reproject(&utm(), 1.0, 2.0));
        assert!(source.need_reproject(&utm(), 2.0, 4.0));
        assert!(source.need_reproject(&utm(), 0.1, 1.0));
    }

    // ─── reprojection execution ─────────────────────────────────────────

    #[test]
    fn test_do_reproject_transformer_failure() {
        let source = Source::height_field("dem.tif").with_dataset(dem(10, 10, 1.0));
        let err = source
            .do_reproject(Path::new("tmp.tif"), &CoordinateSystem::wgs84(), 0.0, &NoWarpService)
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_do_reproject_to_target_resolution() {
        let mut source = Source::height_field("dem.tif")
            .with_level_range(1, 3)
            .with_dataset(dem(11, 11, 1.0));
        source.add_required_resolution(Resolution::new(2.0, 2.0));

        let warped = source
            .do_reproject(Path::new("temporaryfile_dem.tif"), &utm(), 2.0 * 2f64.sqrt(), &GridResampleWarpService)
            .unwrap();

        // 10 units of extent at 2 units per pixel: ceil(10 / 2) + 1.
        let (width, height) = warped.data().unwrap().as_raster().unwrap().dataset().size();
        assert_eq!((width, height), (6, 6));
        assert_eq!(warped.min_level(), 1);
        assert_eq!(warped.max_level(), 3);
        assert_eq!(warped.required_resolutions(), source.required_resolutions());
        assert_eq!(warped.path(), Path::new("temporaryfile_dem.tif"));
    }

    // ─── misc ───────────────────────────────────────────────────────────

    #[test]
    fn test_level_eligibility() {
        let source = Source::image("a.png").with_level_range(2, 4);
        assert!(!source.is_level_eligible(1));
        assert!(source.is_level_eligible(2));
        assert!(source.is_level_eligible(4));
        assert!(!source.is_level_eligible(5));
    }

    #[test]
    fn test_sort_value() {
        let mut source = Source::height_field("dem.tif").with_dataset(dem(11, 11, 1.0));
        source.set_sort_value_from_resolution();
        assert!((source.sort_value() - 2f64.sqrt() * 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_resolution_is_extent_over_values() {
        let source = Source::height_field("dem.tif").with_dataset(dem(10, 20, 0.5));
        assert_eq!(source.resolution(&utm()), Some((0.5, 0.5)));
    }
}
