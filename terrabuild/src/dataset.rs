//! Build orchestration.
//!
//! A [`DataSet`] owns the configuration, the sources and, once computed, the
//! destination quadtree. [`DataSet::build`] runs the phases in order:
//!
//! ```text
//! load_sources ─► compute_destination_graph ─► update_sources_for_destination_graph_needs ─► populate
//!   open rasters     choose cs and extents,        accumulate required resolutions,            read, equalize,
//!   drop failures    build quadtree                consolidate, reproject, sort                emit
//! ```
//!
//! Each phase can also be run on its own, which is how the tests and the
//! CLI's dry-run path use it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::builder::build_destination_graph;
use crate::config::DataSetConfig;
use crate::destination::DestinationGraph;
use crate::emit::TileEmitter;
use crate::error::{BuildError, BuildResult};
use crate::populate::strategy_for_mode;
use crate::raster::{RasterService, WarpService};
use crate::resolution::add_required_resolutions;
use crate::source::{Source, SourceGraph};
use crate::spatial::CoordinateSystem;

/// Prefix of reprojected source files in the temporary directory.
pub const TEMPORARY_FILE_PREFIX: &str = "temporaryfile_";

/// Totals reported after a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildSummary {
    pub sources: usize,
    pub dropped_sources: usize,
    pub reprojected_sources: usize,
    pub composites: usize,
    pub tiles: usize,
    pub levels: usize,
}

/// Sources, configuration and destination tree of one build.
#[derive(Debug)]
pub struct DataSet {
    config: DataSetConfig,
    sources: SourceGraph,
    destination: Option<DestinationGraph>,
    summary: BuildSummary,
}

impl DataSet {
    /// Create an empty data set.
    pub fn new(config: DataSetConfig) -> Self {
        Self {
            config,
            sources: SourceGraph::new(),
            destination: None,
            summary: BuildSummary::default(),
        }
    }

    pub fn config(&self) -> &DataSetConfig {
        &self.config
    }

    pub fn sources(&self) -> &SourceGraph {
        &self.sources
    }

    /// The destination tree, once computed.
    pub fn destination(&self) -> Option<&DestinationGraph> {
        self.destination.as_ref()
    }

    pub fn summary(&self) -> BuildSummary {
        self.summary
    }

    /// Add a source. Sources are drawn in resolution order after
    /// preparation, not in insertion order.
    pub fn add_source(&mut self, source: Source) {
        self.sources.add(source);
    }

    /// Run every phase and emit the result.
    pub fn build(
        &mut self,
        raster_service: &dyn RasterService,
        warp: &dyn WarpService,
        emitter: &mut dyn TileEmitter,
    ) -> BuildResult<BuildSummary> {
        self.config.validate()?;
        self.load_sources(raster_service)?;
        self.compute_destination_graph(warp)?;
        self.update_sources_for_destination_graph_needs(warp)?;
        self.populate(emitter)?;
        Ok(self.summary)
    }

    /// Open every source, dropping those that cannot be read.
    pub fn load_sources(&mut self, raster_service: &dyn RasterService) -> BuildResult<()> {
        let dropped = self.sources.load_all(raster_service);
        self.summary.dropped_sources += dropped;
        self.summary.sources = self.sources.len();
        if self.sources.is_empty() {
            return Err(BuildError::NoSources);
        }
        Ok(())
    }

    /// Destination coordinate system: configured, else the first source's.
    fn destination_coordinate_system(&self) -> BuildResult<CoordinateSystem> {
        if let Some(cs) = &self.config.destination_coordinate_system {
            return Ok(cs.clone());
        }
        match self.sources.first_coordinate_system() {
            Some(cs) => {
                info!(cs = %cs, "Using coordinate system of first source");
                Ok(cs)
            }
            None => {
                warn!("No source defines a coordinate system");
                Err(BuildError::NoCoordinateSystem)
            }
        }
    }

    /// Choose coordinate system and extents and build the quadtree.
    pub fn compute_destination_graph(&mut self, warp: &dyn WarpService) -> BuildResult<&DestinationGraph> {
        if self.sources.is_empty() {
            return Err(BuildError::NoSources);
        }
        let cs = self.destination_coordinate_system()?;
        self.sources.prepare(&cs, warp);

        let extents = match self.config.destination_extents {
            Some(extents) => extents,
            None => self.sources.extents(&cs),
        };
        if !extents.valid() || !(extents.width() > 0.0 || extents.height() > 0.0) {
            return Err(BuildError::InvalidExtents(extents.to_string()));
        }
        info!(extents = %extents, cs = %cs, "Computing destination graph");

        let graph = build_destination_graph(&self.config, &self.sources, extents, &cs);
        self.summary.composites = graph.num_composites();
        self.summary.tiles = graph.num_tiles();
        self.summary.levels = graph.levels().len();
        Ok(&*self.destination.insert(graph))
    }

    /// Record what each source must supply, reproject where needed, and
    /// order sources coarsest first.
    pub fn update_sources_for_destination_graph_needs(&mut self, warp: &dyn WarpService) -> BuildResult<()> {
        let graph = self.destination.as_ref().ok_or(BuildError::MissingDestination)?;
        let cs = graph.cs().clone();

        for tile in graph.tiles() {
            add_required_resolutions(tile, &mut self.sources, &cs, &self.config);
        }
        for source in self.sources.iter_mut() {
            let observed = source.required_resolutions().len();
            source.consolidate_required_resolutions();
            debug!(
                source = %source.path().display(),
                observed,
                consolidated = source.required_resolutions().len(),
                "Consolidated required resolutions"
            );
        }

        let mut replacements = Vec::new();
        let mut directory_ready = false;
        for (index, source) in self.sources.iter().enumerate() {
            let (min, max, target) = self.reprojection_bounds(source);
            if !source.need_reproject(&cs, min, max) {
                continue;
            }
            if !directory_ready {
                prepare_temporary_directory(&self.config.temporary_directory)?;
                directory_ready = true;
            }

            let path = temporary_file_path(&self.config.temporary_directory, source.path());
            match source.do_reproject(&path, &cs, target, warp) {
                Ok(reprojected) => {
                    info!(source = %source.path().display(), to = %path.display(), "Reprojected source");
                    replacements.push((index, reprojected));
                }
                Err(e) if e.is_recoverable() => {
                    warn!(source = %source.path().display(), error = %e, "Reprojection skipped, keeping source");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.summary.reprojected_sources += replacements.len();
        for (index, mut source) in replacements {
            source.prepare(&cs, warp);
            self.sources.replace(index, source);
        }
        self.sources.sort_by_resolution();
        Ok(())
    }

    /// `(min, max, target)` resolution handed to the reprojection decision.
    fn reprojection_bounds(&self, source: &Source) -> (f64, f64, f64) {
        if !self.config.reproject_to_required_resolution {
            return (0.0, 0.0, 0.0);
        }
        let ladder = source.required_resolutions();
        match (ladder.first(), ladder.last()) {
            (Some(first), Some(last)) => {
                let min = first.res_x.hypot(first.res_y);
                let max = last.res_x.hypot(last.res_y);
                (min, max, min)
            }
            _ => (0.0, 0.0, 0.0),
        }
    }

    /// Populate and emit with the strategy of the configured database mode.
    pub fn populate(&mut self, emitter: &mut dyn TileEmitter) -> BuildResult<()> {
        let graph = self.destination.as_mut().ok_or(BuildError::MissingDestination)?;
        let strategy = strategy_for_mode(self.config.database_mode);
        info!(
            strategy = strategy.name(),
            tiles = graph.num_tiles(),
            mode = %self.config.database_mode,
            "Populating destination graph"
        );
        strategy.populate(graph, &self.sources, &self.config, emitter)
    }
}

fn prepare_temporary_directory(path: &Path) -> BuildResult<()> {
    fs::create_dir_all(path).map_err(|source| BuildError::TemporaryDirectory {
        path: path.to_path_buf(),
        source,
    })
}

/// `<dir>/temporaryfile_<stem>.tif`
pub fn temporary_file_path(directory: &Path, source_path: &Path) -> PathBuf {
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    directory.join(format!("{}{}.tif", TEMPORARY_FILE_PREFIX, stem))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::DatabaseMode;
    use crate::extents::GeospatialExtents;
    use crate::emit::RecordingEmitter;
    use crate::raster::{GridResampleWarpService, MemoryRaster, NoWarpService, RasterDataset, RasterError};
    use crate::source::SourceType;
    use crate::spatial::GeoTransform;

    /// Opens nothing; every source in these tests is bound up front.
    struct NoFiles;

    impl RasterService for NoFiles {
        fn open(&self, path: &Path) -> Result<Arc<dyn RasterDataset>, RasterError> {
            Err(RasterError::Open {
                path: path.to_path_buf(),
                reason: "no files in tests".to_string(),
            })
        }
    }

    fn dem(size: u32, extent: f64, projection: Option<&str>) -> Source {
        let pixel = extent / size as f64;
        let heights = (0..size * size).map(|i| (i % size) as f32).collect();
        let mut raster =
            MemoryRaster::elevation(size, size, heights, GeoTransform::north_up(0.0, extent, pixel, pixel)).unwrap();
        if let Some(p) = projection {
            raster = raster.with_projection(p);
        }
        Source::height_field("dem.tif").with_dataset(Arc::new(raster))
    }

    fn config(dir: &Path) -> DataSetConfig {
        DataSetConfig::default()
            .with_num_levels(2)
            .with_basename("db")
            .with_temporary_directory(dir)
    }

    #[test]
    fn test_temporary_file_path() {
        let path = temporary_file_path(Path::new("/tmp/tb"), Path::new("data/alps_dem.tif"));
        assert_eq!(path, PathBuf::from("/tmp/tb/temporaryfile_alps_dem.tif"));
    }

    #[test]
    fn test_no_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut dataset = DataSet::new(config(dir.path()));
        dataset.add_source(Source::height_field("missing.tif"));

        let err = dataset.load_sources(&NoFiles).unwrap_err();
        assert!(matches!(err, BuildError::NoSources));
        assert_eq!(dataset.summary().dropped_sources, 1);
    }

    #[test]
    fn test_no_coordinate_system() {
        let dir = tempfile::tempdir().unwrap();
        let mut dataset = DataSet::new(config(dir.path()));
        dataset.add_source(dem(16, 100.0, None));

        let err = dataset.compute_destination_graph(&NoWarpService).unwrap_err();
        assert!(matches!(err, BuildError::NoCoordinateSystem));
    }

    #[test]
    fn test_configured_extents_must_be_valid() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).with_destination_extents(GeospatialExtents::empty());
        let mut dataset = DataSet::new(config);
        dataset.add_source(dem(16, 100.0, Some("EPSG:32632")));

        let err = dataset.compute_destination_graph(&NoWarpService).unwrap_err();
        assert!(matches!(err, BuildError::InvalidExtents(_)));
    }

    #[test]
    fn test_phases_require_destination() {
        let dir = tempfile::tempdir().unwrap();
        let mut dataset = DataSet::new(config(dir.path()));
        assert!(matches!(
            dataset.populate(&mut RecordingEmitter::default()),
            Err(BuildError::MissingDestination)
        ));
        assert!(matches!(
            dataset.update_sources_for_destination_graph_needs(&NoWarpService),
            Err(BuildError::MissingDestination)
        ));
    }

    #[test]
    fn test_build_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut dataset = DataSet::new(config(dir.path()));
        dataset.add_source(dem(256, 1000.0, Some("EPSG:32632")));

        let mut emitter = RecordingEmitter::default();
        let summary = dataset.build(&NoFiles, &NoWarpService, &mut emitter).unwrap();

        assert_eq!(summary.sources, 1);
        assert_eq!(summary.tiles, 5);
        assert_eq!(summary.levels, 2);
        assert_eq!(emitter.tiles.len(), 5);
        assert_eq!(emitter.groups[0].file_name, "db.json");

        let source = dataset.sources().iter().next().unwrap();
        assert!(!source.required_resolutions().is_empty());
    }

    #[test]
    fn test_single_tree_mode_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).with_database_mode(DatabaseMode::SingleTree);
        let mut dataset = DataSet::new(config);
        dataset.add_source(dem(256, 1000.0, Some("EPSG:32632")));

        let mut emitter = RecordingEmitter::default();
        dataset.build(&NoFiles, &NoWarpService, &mut emitter).unwrap();
        assert_eq!(emitter.groups.len(), 5);
    }

    #[test]
    fn test_foreign_source_kept_when_transformer_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path()).with_destination_coordinate_system(CoordinateSystem::new("EPSG:32633"));
        let mut dataset = DataSet::new(config);
        dataset.add_source(dem(64, 1000.0, Some("EPSG:32632")));

        dataset.compute_destination_graph(&NoWarpService).unwrap();
        dataset.update_sources_for_destination_graph_needs(&NoWarpService).unwrap();

        assert_eq!(dataset.summary().reprojected_sources, 0);
        assert_eq!(dataset.sources().iter().next().unwrap().path(), Path::new("dem.tif"));
        assert!(dir.path().exists());
    }

    #[test]
    fn test_reproject_to_required_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("warped");
        let config = config(&tmp).with_reproject_to_required_resolution(true);
        let mut dataset = DataSet::new(config);
        dataset.add_source(dem(256, 1000.0, Some("EPSG:32632")));

        dataset.compute_destination_graph(&GridResampleWarpService).unwrap();
        dataset
            .update_sources_for_destination_graph_needs(&GridResampleWarpService)
            .unwrap();

        assert_eq!(dataset.summary().reprojected_sources, 1);
        let source = dataset.sources().iter().next().unwrap();
        assert_eq!(source.source_type(), SourceType::HeightField);
        assert_eq!(source.path(), tmp.join("temporaryfile_dem.tif"));
        assert!(tmp.is_dir());
    }
}
