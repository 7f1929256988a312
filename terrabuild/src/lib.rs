//! Terrabuild - quadtree construction and tile population for streamed
//! terrain databases.
//!
//! A build takes georeferenced imagery and elevation rasters (plus placed
//! models), lays a level-of-detail quadtree over their combined extents,
//! fills every tile from the sources that cover it, stitches tile
//! boundaries so neighbours agree, and hands the tiles and their grouping
//! to a [`TileEmitter`](emit::TileEmitter).
//!
//! ```text
//! Source ──► SourceGraph ──► builder ──► DestinationGraph ──► populate ──► equalize ──► emit
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use terrabuild::emit::{EmitError, EmittedGroup, EmittedTile, TileEmitter};
//! use terrabuild::raster::{MemoryRaster, NoWarpService, ImageFileService};
//! use terrabuild::spatial::GeoTransform;
//! use terrabuild::{DataSet, DataSetConfig, Source};
//!
//! #[derive(Default)]
//! struct Count(usize);
//!
//! impl TileEmitter for Count {
//!     fn emit_tile(&mut self, _tile: &EmittedTile<'_>) -> Result<(), EmitError> {
//!         self.0 += 1;
//!         Ok(())
//!     }
//!     fn emit_group(&mut self, _group: &EmittedGroup) -> Result<(), EmitError> {
//!         Ok(())
//!     }
//! }
//!
//! let heights = vec![100.0; 32 * 32];
//! let dem = MemoryRaster::elevation(32, 32, heights, GeoTransform::north_up(0.0, 320.0, 10.0, 10.0))
//!     .unwrap()
//!     .with_projection("EPSG:32632");
//!
//! let mut dataset = DataSet::new(DataSetConfig::default().with_num_levels(1));
//! dataset.add_source(Source::height_field("dem.tif").with_dataset(Arc::new(dem)));
//!
//! let mut emitter = Count::default();
//! let summary = dataset.build(&ImageFileService::new(), &NoWarpService, &mut emitter).unwrap();
//! assert_eq!(summary.tiles, emitter.0);
//! ```

pub mod builder;
pub mod config;
pub mod dataset;
pub mod destination;
pub mod emit;
pub mod equalize;
pub mod error;
pub mod extents;
pub mod populate;
pub mod raster;
pub mod resolution;
pub mod source;
pub mod spatial;

pub use config::{DataSetConfig, DatabaseMode, HeightSampling};
pub use dataset::{BuildSummary, DataSet};
pub use destination::{DestinationGraph, DestinationTile, TileKey};
pub use emit::{DirectoryEmitter, TileEmitter};
pub use error::{BuildError, BuildResult};
pub use extents::GeospatialExtents;
pub use source::{Source, SourceGraph, SourceType};
pub use spatial::CoordinateSystem;
