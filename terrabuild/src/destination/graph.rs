//! The destination arena and quad map.

use std::collections::BTreeMap;

use tracing::{debug, error};

use super::{CompositeDestination, CompositeId, CompositeKind, DestinationTile, Position, TileKey};
use crate::error::{BuildError, BuildResult};
use crate::extents::GeospatialExtents;
use crate::spatial::CoordinateSystem;

type Row = BTreeMap<u32, CompositeId>;
type Level = BTreeMap<u32, Row>;

/// Arena holding every composite and tile of a quadtree.
///
/// The first composite added is the root. The quad map indexes composites
/// by `level → y → x`, iterated in ascending order, which is the order the
/// row streaming strategy walks them.
#[derive(Debug)]
pub struct DestinationGraph {
    cs: CoordinateSystem,
    composites: Vec<CompositeDestination>,
    tiles: BTreeMap<TileKey, DestinationTile>,
    quad_map: BTreeMap<u32, Level>,
}

impl DestinationGraph {
    /// Create an empty graph in coordinate system `cs`.
    pub fn new(cs: CoordinateSystem) -> Self {
        Self {
            cs,
            composites: Vec::new(),
            tiles: BTreeMap::new(),
            quad_map: BTreeMap::new(),
        }
    }

    /// Destination coordinate system.
    pub fn cs(&self) -> &CoordinateSystem {
        &self.cs
    }

    /// Add a composite below `parent` and index it in the quad map.
    #[allow(clippy::too_many_arguments)]
    pub fn add_composite(
        &mut self,
        kind: CompositeKind,
        name: String,
        level: u32,
        tile_x: u32,
        tile_y: u32,
        extents: GeospatialExtents,
        parent: Option<CompositeId>,
        max_visible_distance: f64,
    ) -> CompositeId {
        let id = CompositeId(self.composites.len());
        self.composites.push(CompositeDestination {
            id,
            kind,
            name,
            level,
            tile_x,
            tile_y,
            extents,
            tiles: Vec::new(),
            children: Vec::new(),
            parent,
            max_visible_distance,
            sub_tiles_generated: false,
        });

        if let Some(parent) = parent {
            self.composites[parent.0].children.push(id);
        }

        self.quad_map
            .entry(level)
            .or_default()
            .entry(tile_y)
            .or_default()
            .insert(tile_x, id);

        id
    }

    /// Add a tile to the composite it names.
    pub fn add_tile(&mut self, tile: DestinationTile) {
        if let Some(composite) = self.composites.get_mut(tile.composite.0) {
            composite.tiles.push(tile.key);
        }
        self.tiles.insert(tile.key, tile);
    }

    /// The root composite.
    pub fn root(&self) -> Option<CompositeId> {
        (!self.composites.is_empty()).then_some(CompositeId(0))
    }

    pub fn composite(&self, id: CompositeId) -> &CompositeDestination {
        &self.composites[id.0]
    }

    pub fn composite_mut(&mut self, id: CompositeId) -> &mut CompositeDestination {
        &mut self.composites[id.0]
    }

    pub fn composites(&self) -> impl Iterator<Item = &CompositeDestination> {
        self.composites.iter()
    }

    pub fn num_composites(&self) -> usize {
        self.composites.len()
    }

    pub fn tile(&self, key: TileKey) -> Option<&DestinationTile> {
        self.tiles.get(&key)
    }

    pub fn tile_mut(&mut self, key: TileKey) -> Option<&mut DestinationTile> {
        self.tiles.get_mut(&key)
    }

    /// All tiles ordered by level, then column, then row.
    pub fn tiles(&self) -> impl Iterator<Item = &DestinationTile> {
        self.tiles.values()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut DestinationTile> {
        self.tiles.values_mut()
    }

    pub fn tile_keys(&self) -> Vec<TileKey> {
        self.tiles.keys().copied().collect()
    }

    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Move a tile out of the arena.
    ///
    /// Used to hand tiles to worker threads or to borrow several tiles
    /// mutably at once; pair every call with [`put_tile`](Self::put_tile).
    pub fn take_tile(&mut self, key: TileKey) -> Option<DestinationTile> {
        self.tiles.remove(&key)
    }

    /// Return a tile taken with [`take_tile`](Self::take_tile).
    pub fn put_tile(&mut self, tile: DestinationTile) {
        self.tiles.insert(tile.key, tile);
    }

    /// Composite at `(level, x, y)`.
    pub fn composite_at(&self, level: u32, x: u32, y: u32) -> Option<CompositeId> {
        self.quad_map.get(&level)?.get(&y)?.get(&x).copied()
    }

    /// First tile of the composite at `(level, x, y)`.
    pub fn tile_at(&self, level: u32, x: u32, y: u32) -> Option<TileKey> {
        let id = self.composite_at(level, x, y)?;
        self.composites[id.0].tiles.first().copied()
    }

    /// Levels present in the quad map, ascending.
    pub fn levels(&self) -> Vec<u32> {
        self.quad_map.keys().copied().collect()
    }

    /// Composites of `level` grouped by row, south to north, west to east.
    pub fn rows(&self, level: u32) -> Vec<Vec<CompositeId>> {
        self.quad_map
            .get(&level)
            .map(|rows| rows.values().map(|row| row.values().copied().collect()).collect())
            .unwrap_or_default()
    }

    /// Number of ancestors of `id`.
    pub fn depth(&self, id: CompositeId) -> u32 {
        let mut depth = 0;
        let mut current = self.composites[id.0].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.composites[parent.0].parent;
        }
        depth
    }

    /// Deepest level in the tree.
    pub fn max_level(&self) -> Option<u32> {
        self.quad_map.keys().next_back().copied()
    }

    /// Link every tile to its same-level neighbours through the quad map.
    ///
    /// Resets all equalization flags.
    pub fn compute_neighbours(&mut self) {
        let keys = self.tile_keys();
        for key in keys {
            let mut neighbours = [None; 8];
            for position in Position::ALL {
                neighbours[position.index()] = key
                    .offset(position)
                    .and_then(|n| self.tile_at(n.level, n.x, n.y));
            }
            if let Some(tile) = self.tiles.get_mut(&key) {
                tile.neighbours = neighbours;
                tile.equalized = [false; 8];
            }
        }
        debug!(tiles = self.tiles.len(), "Computed tile neighbours");
    }

    /// Verify that every neighbour link points back.
    pub fn check_neighbouring_tiles(&self) -> BuildResult<()> {
        for tile in self.tiles.values() {
            for position in Position::ALL {
                let Some(neighbour_key) = tile.neighbour(position) else {
                    continue;
                };
                let points_back = self
                    .tiles
                    .get(&neighbour_key)
                    .and_then(|n| n.neighbour(position.opposite()))
                    == Some(tile.key);
                if !points_back {
                    error!(
                        tile = %tile.key,
                        neighbour = %neighbour_key,
                        position = ?position,
                        "Neighbour does not point back"
                    );
                    return Err(BuildError::NeighbourReciprocity {
                        tile: tile.key,
                        neighbour: neighbour_key,
                        position,
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns true once every tile of every child of `id` is complete.
    pub fn sub_tiles_complete(&self, id: CompositeId) -> bool {
        self.composites[id.0].children.iter().all(|child| {
            self.composites[child.0]
                .tiles
                .iter()
                .all(|key| self.tiles.get(key).is_some_and(|t| t.complete))
        })
    }

    /// Drop the buffers of the tiles owned by `id`.
    pub fn release_local_data(&mut self, id: CompositeId) {
        let keys = self.composites[id.0].tiles.clone();
        for key in keys {
            if let Some(tile) = self.tiles.get_mut(&key) {
                tile.release_buffers();
                debug!(tile = %key, "Released tile buffers");
            }
        }
    }

    /// Drop the buffers of the tiles owned by the children of `id`.
    pub fn release_sub_tile_data(&mut self, id: CompositeId) {
        let children = self.composites[id.0].children.clone();
        for child in children {
            self.release_local_data(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 grid at level 1 below a root at level 0.
    fn grid() -> DestinationGraph {
        let mut graph = DestinationGraph::new(CoordinateSystem::new("EPSG:32632"));
        let extents = GeospatialExtents::new(0.0, 0.0, 2.0, 2.0, false);
        let root = graph.add_composite(CompositeKind::Lod, "r".into(), 0, 0, 0, extents, None, 10.0);
        graph.add_tile(DestinationTile::new(TileKey::new(0, 0, 0), "r".into(), extents, root));

        for (i, q) in extents.split_quadrants().iter().enumerate() {
            let (x, y) = ((i % 2) as u32, (i / 2) as u32);
            let id = graph.add_composite(CompositeKind::Group, format!("c{}", i), 1, x, y, *q, Some(root), 5.0);
            graph.add_tile(DestinationTile::new(TileKey::new(1, x, y), format!("c{}", i), *q, id));
        }
        graph.compute_neighbours();
        graph
    }

    #[test]
    fn test_neighbours_from_quad_map() {
        let graph = grid();
        let bl = graph.tile(TileKey::new(1, 0, 0)).unwrap();
        assert_eq!(bl.neighbour(Position::Right), Some(TileKey::new(1, 1, 0)));
        assert_eq!(bl.neighbour(Position::Above), Some(TileKey::new(1, 0, 1)));
        assert_eq!(bl.neighbour(Position::RightAbove), Some(TileKey::new(1, 1, 1)));
        assert_eq!(bl.neighbour(Position::Left), None);
        assert_eq!(bl.neighbour(Position::Below), None);

        let root = graph.tile(TileKey::new(0, 0, 0)).unwrap();
        assert!(root.neighbours.iter().all(Option::is_none));
    }

    #[test]
    fn test_reciprocity_holds() {
        assert!(grid().check_neighbouring_tiles().is_ok());
    }

    #[test]
    fn test_reciprocity_violation_detected() {
        let mut graph = grid();
        graph.tile_mut(TileKey::new(1, 1, 0)).unwrap().neighbours[Position::Left.index()] = None;
        let err = graph.check_neighbouring_tiles().unwrap_err();
        assert!(matches!(err, BuildError::NeighbourReciprocity { .. }));
    }

    #[test]
    fn test_rows_south_to_north() {
        let graph = grid();
        let rows = graph.rows(1);
        assert_eq!(rows.len(), 2);
        let first: Vec<_> = rows[0].iter().map(|id| graph.composite(*id).tile_x).collect();
        assert_eq!(first, vec![0, 1]);
        assert_eq!(graph.composite(rows[1][0]).tile_y, 1);
        assert!(graph.rows(7).is_empty());
    }

    #[test]
    fn test_depth_and_levels() {
        let graph = grid();
        assert_eq!(graph.levels(), vec![0, 1]);
        assert_eq!(graph.max_level(), Some(1));
        let child = graph.composite_at(1, 1, 1).unwrap();
        assert_eq!(graph.depth(child), 1);
        assert_eq!(graph.depth(graph.root().unwrap()), 0);
    }

    #[test]
    fn test_sub_tiles_complete_and_release() {
        let mut graph = grid();
        let root = graph.root().unwrap();
        assert!(!graph.sub_tiles_complete(root));
        for tile in graph.tiles_mut() {
            tile.complete = true;
        }
        assert!(graph.sub_tiles_complete(root));

        graph.tile_mut(TileKey::new(1, 0, 0)).unwrap().terrain.height_field =
            Some(crate::destination::HeightField::new(2, 2, (0.0, 0.0), 1.0, 1.0));
        graph.release_sub_tile_data(root);
        assert!(!graph.tile(TileKey::new(1, 0, 0)).unwrap().has_buffers());
    }

    #[test]
    fn test_take_and_put_tile() {
        let mut graph = grid();
        let key = TileKey::new(1, 1, 1);
        let tile = graph.take_tile(key).unwrap();
        assert!(graph.tile(key).is_none());
        graph.put_tile(tile);
        assert!(graph.tile(key).is_some());
    }
}
