//! When tiles are read, equalized, emitted and released.
//!
//! | Strategy | Mode | Resident buffers |
//! |----------|------|------------------|
//! | [`WholeTreeStrategy`] | single LOD tree | every tile |
//! | [`RowStreamingStrategy`] | paged | about two rows per level |
//!
//! Both read the tiles of one batch in parallel; equalization and emission
//! are sequential.

use rayon::prelude::*;
use tracing::{debug, info};

use super::read_tile;
use crate::config::{DataSetConfig, DatabaseMode};
use crate::destination::{CompositeId, DestinationGraph, DestinationTile, TileKey};
use crate::emit::{paged_root_group, sub_tile_group, tree_group, EmittedTile, TileEmitter};
use crate::equalize::equalize_boundaries;
use crate::error::BuildResult;
use crate::source::SourceGraph;

/// Drives population of a destination graph.
pub trait TilePopulationStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Populate, equalize and emit every tile of `graph`.
    fn populate(
        &self,
        graph: &mut DestinationGraph,
        sources: &SourceGraph,
        config: &DataSetConfig,
        emitter: &mut dyn TileEmitter,
    ) -> BuildResult<()>;
}

/// The strategy matching a database mode.
pub fn strategy_for_mode(mode: DatabaseMode) -> Box<dyn TilePopulationStrategy> {
    match mode {
        DatabaseMode::SingleTree => Box::new(WholeTreeStrategy),
        DatabaseMode::Paged => Box::new(RowStreamingStrategy),
    }
}

/// Read `keys` in parallel.
///
/// Tiles are moved out of the arena for the duration of the read and always
/// returned, also when a read fails.
fn read_tiles(
    graph: &mut DestinationGraph,
    keys: &[TileKey],
    sources: &SourceGraph,
    config: &DataSetConfig,
) -> BuildResult<()> {
    let cs = graph.cs().clone();
    let mut tiles: Vec<DestinationTile> = keys.iter().filter_map(|key| graph.take_tile(*key)).collect();

    let result = tiles
        .par_iter_mut()
        .try_for_each(|tile| read_tile(tile, sources, &cs, config));

    for tile in tiles {
        graph.put_tile(tile);
    }
    result?;
    Ok(())
}

fn emit_tiles(graph: &DestinationGraph, keys: &[TileKey], emitter: &mut dyn TileEmitter) -> BuildResult<()> {
    for key in keys {
        if let Some(tile) = graph.tile(*key) {
            emitter.emit_tile(&EmittedTile::from_tile(tile))?;
        }
    }
    Ok(())
}

fn mark_complete(graph: &mut DestinationGraph, keys: &[TileKey]) {
    for key in keys {
        if let Some(tile) = graph.tile_mut(*key) {
            tile.complete = true;
        }
    }
}

/// Populate everything, then emit one group per composite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeTreeStrategy;

impl TilePopulationStrategy for WholeTreeStrategy {
    fn name(&self) -> &'static str {
        "whole tree"
    }

    fn populate(
        &self,
        graph: &mut DestinationGraph,
        sources: &SourceGraph,
        config: &DataSetConfig,
        emitter: &mut dyn TileEmitter,
    ) -> BuildResult<()> {
        let keys = graph.tile_keys();
        info!(tiles = keys.len(), "Reading all tiles");
        read_tiles(graph, &keys, sources, config)?;

        graph.check_neighbouring_tiles()?;
        for key in &keys {
            equalize_boundaries(graph, *key);
        }
        mark_complete(graph, &keys);

        emit_tiles(graph, &keys, emitter)?;
        let ids: Vec<CompositeId> = graph.composites().map(|c| c.id).collect();
        for id in ids {
            emitter.emit_group(&tree_group(graph, id, config))?;
        }

        emitter.finish()?;
        info!(tiles = keys.len(), groups = graph.num_composites(), "Emitted tree");
        Ok(())
    }
}

/// Stream each level row by row, south to north.
///
/// A row is equalized and written once the row above it has been read, so
/// its northern edge can be stitched. Writing a row emits the sub-tile group
/// of every parent whose children are now all complete and releases those
/// children's buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowStreamingStrategy;

impl RowStreamingStrategy {
    fn read_row(
        &self,
        graph: &mut DestinationGraph,
        row: &[CompositeId],
        sources: &SourceGraph,
        config: &DataSetConfig,
    ) -> BuildResult<()> {
        let keys: Vec<TileKey> = row
            .iter()
            .flat_map(|id| graph.composite(*id).tiles.iter().copied())
            .collect();
        read_tiles(graph, &keys, sources, config)
    }

    fn write_row(
        &self,
        graph: &mut DestinationGraph,
        row: &[CompositeId],
        config: &DataSetConfig,
        emitter: &mut dyn TileEmitter,
    ) -> BuildResult<()> {
        for id in row {
            let keys = graph.composite(*id).tiles.clone();
            for key in &keys {
                equalize_boundaries(graph, *key);
            }
            mark_complete(graph, &keys);
        }

        for id in row {
            match graph.composite(*id).parent {
                Some(parent) => {
                    if graph.composite(parent).sub_tiles_generated || !graph.sub_tiles_complete(parent) {
                        continue;
                    }
                    let children = graph.composite(parent).children.clone();
                    for child in children {
                        let keys = graph.composite(child).tiles.clone();
                        emit_tiles(graph, &keys, emitter)?;
                    }
                    emitter.emit_group(&sub_tile_group(graph, parent, config))?;
                    graph.composite_mut(parent).sub_tiles_generated = true;
                    graph.release_sub_tile_data(parent);
                    debug!(composite = %graph.composite(parent).name, "Wrote sub-tiles");
                }
                None => {
                    let keys = graph.composite(*id).tiles.clone();
                    emit_tiles(graph, &keys, emitter)?;
                    if let Some(group) = paged_root_group(graph, config) {
                        emitter.emit_group(&group)?;
                    }
                    graph.release_local_data(*id);
                    debug!(composite = %graph.composite(*id).name, "Wrote root");
                }
            }
        }
        Ok(())
    }
}

impl TilePopulationStrategy for RowStreamingStrategy {
    fn name(&self) -> &'static str {
        "row streaming"
    }

    fn populate(
        &self,
        graph: &mut DestinationGraph,
        sources: &SourceGraph,
        config: &DataSetConfig,
        emitter: &mut dyn TileEmitter,
    ) -> BuildResult<()> {
        graph.check_neighbouring_tiles()?;

        for level in graph.levels() {
            let rows = graph.rows(level);
            info!(level, rows = rows.len(), "Populating level");

            let mut previous: Option<Vec<CompositeId>> = None;
            for row in rows {
                self.read_row(graph, &row, sources, config)?;
                if let Some(done) = previous.replace(row) {
                    self.write_row(graph, &done, config, emitter)?;
                }
            }
            if let Some(done) = previous {
                self.write_row(graph, &done, config, emitter)?;
            }
        }

        emitter.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use super::*;
    use crate::builder::build_destination_graph;
    use crate::emit::{EmitError, EmittedGroup, GroupContent, RecordingEmitter};
    use crate::extents::GeospatialExtents;
    use crate::raster::MemoryRaster;
    use crate::source::Source;
    use crate::spatial::{CoordinateSystem, GeoTransform};

    fn utm() -> CoordinateSystem {
        CoordinateSystem::new("EPSG:32632")
    }

    /// Sloped DEM of 256 samples over 1000 units plus a matching image.
    fn sources() -> SourceGraph {
        let pixel = 1000.0 / 256.0;
        let gt = GeoTransform::north_up(0.0, 1000.0, pixel, pixel);
        let heights = (0..256 * 256).map(|i| (i % 256) as f32).collect();
        let dem = MemoryRaster::elevation(256, 256, heights, gt)
            .unwrap()
            .with_projection("EPSG:32632");
        let image = MemoryRaster::solid_rgb(256, 256, [90, 120, 60], gt)
            .unwrap()
            .with_projection("EPSG:32632");
        [
            Source::height_field("dem.tif").with_dataset(Arc::new(dem)),
            Source::image("ortho.tif").with_dataset(Arc::new(image)),
        ]
        .into_iter()
        .collect()
    }

    fn graph(config: &DataSetConfig, sources: &SourceGraph) -> DestinationGraph {
        let extents = GeospatialExtents::new(0.0, 0.0, 1000.0, 1000.0, false);
        build_destination_graph(config, sources, extents, &utm())
    }

    #[test]
    fn test_strategy_for_mode() {
        assert_eq!(strategy_for_mode(DatabaseMode::SingleTree).name(), "whole tree");
        assert_eq!(strategy_for_mode(DatabaseMode::Paged).name(), "row streaming");
    }

    // ─── whole tree ─────────────────────────────────────────────────────

    #[test]
    fn test_whole_tree_emits_every_tile_then_groups() {
        let sources = sources();
        let config = DataSetConfig::default().with_num_levels(2).with_basename("db");
        let mut graph = graph(&config, &sources);
        let mut emitter = RecordingEmitter::default();

        WholeTreeStrategy
            .populate(&mut graph, &sources, &config, &mut emitter)
            .unwrap();

        assert_eq!(emitter.tiles.len(), 5);
        let unique: BTreeSet<_> = emitter.tiles.iter().collect();
        assert_eq!(unique.len(), 5);
        assert_eq!(emitter.groups.len(), 5);
        // Tiles first, groups after.
        assert!(emitter.order[..5].iter().all(|name| !name.ends_with(".json")));
        assert_eq!(emitter.groups[0].file_name, "db.json");

        assert!(graph.tiles().all(|t| t.complete && t.has_buffers()));
    }

    #[test]
    fn test_whole_tree_stitches_neighbours() {
        let sources = sources();
        let config = DataSetConfig::default().with_num_levels(2);
        let mut graph = graph(&config, &sources);

        WholeTreeStrategy
            .populate(&mut graph, &sources, &config, &mut RecordingEmitter::default())
            .unwrap();

        let bl = graph.tile(TileKey::new(1, 0, 0)).unwrap().height_field().unwrap();
        let br = graph.tile(TileKey::new(1, 1, 0)).unwrap().height_field().unwrap();
        assert_eq!(bl.num_rows(), br.num_rows());
        let last = bl.num_columns() - 1;
        for r in 0..bl.num_rows() {
            assert_eq!(bl.height(last, r), br.height(0, r));
        }
    }

    // ─── row streaming ──────────────────────────────────────────────────

    #[test]
    fn test_row_streaming_emits_paged_groups() {
        let sources = sources();
        let config = DataSetConfig::default().with_num_levels(2).with_basename("db");
        let mut graph = graph(&config, &sources);
        let mut emitter = RecordingEmitter::default();

        RowStreamingStrategy
            .populate(&mut graph, &sources, &config, &mut emitter)
            .unwrap();

        assert_eq!(emitter.tiles.len(), 5);
        let names: Vec<&str> = emitter.groups.iter().map(|g| g.file_name.as_str()).collect();
        assert_eq!(names, vec!["db.json", "db_L0_X0_Y0_subtile.json"]);

        let root = &emitter.groups[0];
        assert_eq!(
            root.entries[1].content,
            GroupContent::File("db_L0_X0_Y0_subtile.json".to_string())
        );
        assert_eq!(emitter.groups[1].entries.len(), 4);

        // Root, then the four children before their group.
        assert_eq!(emitter.order[0], "db_L0_X0_Y0");
        assert_eq!(emitter.order[1], "db.json");
        assert_eq!(emitter.order[6], "db_L0_X0_Y0_subtile.json");

        assert!(graph.composite(graph.root().unwrap()).sub_tiles_generated);
        assert!(graph.tiles().all(|t| t.complete && !t.has_buffers()));
    }

    #[test]
    fn test_row_streaming_matches_whole_tree_pixels() {
        let sources = sources();
        let config = DataSetConfig::default().with_num_levels(2);

        /// Keeps a copy of every emitted height field.
        #[derive(Default)]
        struct Capture(Vec<(TileKey, Vec<f32>)>);
        impl TileEmitter for Capture {
            fn emit_tile(&mut self, tile: &EmittedTile<'_>) -> Result<(), EmitError> {
                let heights = tile.height_field.map(|hf| hf.heights().to_vec()).unwrap_or_default();
                self.0.push((tile.key, heights));
                Ok(())
            }
            fn emit_group(&mut self, _group: &EmittedGroup) -> Result<(), EmitError> {
                Ok(())
            }
        }

        let mut streamed = Capture::default();
        RowStreamingStrategy
            .populate(&mut graph(&config, &sources), &sources, &config, &mut streamed)
            .unwrap();
        let mut whole = Capture::default();
        WholeTreeStrategy
            .populate(&mut graph(&config, &sources), &sources, &config, &mut whole)
            .unwrap();

        streamed.0.sort_by_key(|(k, _)| *k);
        whole.0.sort_by_key(|(k, _)| *k);
        assert_eq!(streamed.0, whole.0);
    }

    #[test]
    fn test_single_tile_tree() {
        let sources = sources();
        let config = DataSetConfig::default().with_num_levels(1).with_basename("one");
        let mut graph = graph(&config, &sources);
        let mut emitter = RecordingEmitter::default();

        RowStreamingStrategy
            .populate(&mut graph, &sources, &config, &mut emitter)
            .unwrap();

        assert_eq!(emitter.order, vec!["one_L0_X0_Y0".to_string(), "one.json".to_string()]);
        assert_eq!(emitter.groups[0].entries.len(), 1);
    }
}
