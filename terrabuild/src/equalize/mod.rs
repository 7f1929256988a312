//! Boundary equalization between neighbouring tiles.
//!
//! Adjacent tiles are sampled independently, so their shared edges would
//! disagree by a texel or a few centimetres. Equalization averages the
//! shared samples and writes the result into both tiles:
//!
//! ```text
//!        ┌──────┬──────┐
//!        │  TL  │  TR  │     corner: every present tile meeting at the
//!        │      │      │             point contributes one sample
//!        ├──────●──────┤
//!        │  BL  │  BR  │     edge:   interior samples, corners excluded
//!        │      │      │
//!        └──────┴──────┘
//! ```
//!
//! Corners run first, then edges, each guarded by the per-position
//! `equalized` flags on both sides, so equalizing a tile twice (or from
//! either side) changes nothing the second time. The averaged boundary
//! gradient is stored in the tiles' height-delta slots so emitted normals
//! agree along the seam.
//!
//! Image rows run north to south; height field rows south to north.

use tracing::trace;

use crate::destination::{DestinationGraph, DestinationTile, HeightDelta, Position, TileKey};

/// Equalize all corners and edges of the tile at `key`.
pub fn equalize_boundaries(graph: &mut DestinationGraph, key: TileKey) {
    for corner in Position::CORNERS {
        equalize_corner(graph, key, corner);
    }
    for edge in Position::EDGES {
        equalize_edge(graph, key, edge);
    }
}

/// Image pixel at `corner` of a `width x height` image.
fn image_corner(corner: Position, width: u32, height: u32) -> (u32, u32) {
    match corner {
        Position::LeftBelow => (0, height - 1),
        Position::BelowRight => (width - 1, height - 1),
        Position::RightAbove => (width - 1, 0),
        _ => (0, 0),
    }
}

/// Height field vertex at `corner` of a `columns x rows` grid.
fn vertex_corner(corner: Position, columns: u32, rows: u32) -> (u32, u32) {
    match corner {
        Position::LeftBelow => (0, 0),
        Position::BelowRight => (columns - 1, 0),
        Position::RightAbove => (columns - 1, rows - 1),
        _ => (0, rows - 1),
    }
}

/// Image pixel `i` along `edge`.
fn image_edge(edge: Position, i: u32, width: u32, height: u32) -> (u32, u32) {
    match edge {
        Position::Left => (0, i),
        Position::Right => (width - 1, i),
        Position::Below => (i, height - 1),
        _ => (i, 0),
    }
}

/// Height field vertex `i` along `edge`.
fn vertex_edge(edge: Position, i: u32, columns: u32, rows: u32) -> (u32, u32) {
    match edge {
        Position::Left => (0, i),
        Position::Right => (columns - 1, i),
        Position::Below => (i, 0),
        _ => (i, rows - 1),
    }
}

fn is_vertical(edge: Position) -> bool {
    matches!(edge, Position::Left | Position::Right)
}

/// Average the samples at one corner across every tile meeting there.
///
/// Contributors are the tile itself, the two edge neighbours adjacent to
/// the corner and the diagonal neighbour, each at its own corner touching
/// the shared point.
pub fn equalize_corner(graph: &mut DestinationGraph, key: TileKey, corner: Position) {
    let Some(tile) = graph.tile(key) else {
        return;
    };
    if tile.equalized[corner.index()] {
        return;
    }

    let mut contributors = vec![(key, corner)];
    for (neighbour_at, steps) in [(corner.rotate(7), 2), (corner, 4), (corner.rotate(1), 6)] {
        if let Some(neighbour) = tile.neighbour(neighbour_at) {
            contributors.push((neighbour, corner.rotate(steps)));
        }
    }

    let mut tiles: Vec<(DestinationTile, Position)> = contributors
        .iter()
        .filter_map(|&(k, c)| graph.take_tile(k).map(|t| (t, c)))
        .collect();

    for (tile, c) in &mut tiles {
        tile.equalized[c.index()] = true;
    }

    if tiles.len() > 1 {
        average_corner(&mut tiles);
        trace!(tile = %key, corner = ?corner, contributors = tiles.len(), "Equalized corner");
    }

    for (tile, _) in tiles {
        graph.put_tile(tile);
    }
}

fn average_corner(tiles: &mut [(DestinationTile, Position)]) {
    let layers = tiles.iter().map(|(t, _)| t.imagery.len()).max().unwrap_or(0);
    for layer in 0..layers {
        let mut sum = [0u32; 3];
        let mut count = 0u32;
        for (tile, corner) in tiles.iter() {
            if let Some(image) = tile.image(layer) {
                let (x, y) = image_corner(*corner, image.width(), image.height());
                let rgb = image.rgb(x, y);
                for c in 0..3 {
                    sum[c] += rgb[c] as u32;
                }
                count += 1;
            }
        }
        if count < 2 {
            continue;
        }
        let mean = sum.map(|s| (s / count) as u8);
        for (tile, corner) in tiles.iter_mut() {
            if let Some(image) = tile.imagery.get_mut(layer).and_then(|l| l.image.as_mut()) {
                let (x, y) = image_corner(*corner, image.width(), image.height());
                image.set_rgb(x, y, mean);
            }
        }
    }

    let mut heights = Vec::new();
    for (tile, corner) in tiles.iter() {
        if let Some(hf) = tile.height_field() {
            let (c, r) = vertex_corner(*corner, hf.num_columns(), hf.num_rows());
            heights.push(hf.height(c, r));
        }
    }
    if heights.is_empty() {
        return;
    }
    let mean = heights.iter().sum::<f32>() / heights.len() as f32;

    let mut gradients = Vec::with_capacity(heights.len());
    for (tile, corner) in tiles.iter_mut() {
        if let Some(hf) = tile.terrain.height_field.as_mut() {
            let (c, r) = vertex_corner(*corner, hf.num_columns(), hf.num_rows());
            hf.set_height(c, r, mean);
            gradients.push(hf.gradient(c, r));
        }
    }
    if let Some(delta) = HeightDelta::mean(&gradients) {
        for (tile, corner) in tiles.iter_mut() {
            if tile.height_field().is_some() {
                tile.height_deltas[corner.index()] = Some(delta);
            }
        }
    }
}

/// Average the shared interior samples along one edge.
pub fn equalize_edge(graph: &mut DestinationGraph, key: TileKey, edge: Position) {
    let Some(mut tile) = graph.take_tile(key) else {
        return;
    };
    if tile.equalized[edge.index()] {
        graph.put_tile(tile);
        return;
    }
    tile.equalized[edge.index()] = true;

    let opposite = edge.opposite();
    let neighbour = tile.neighbour(edge).and_then(|k| graph.take_tile(k));
    let Some(mut neighbour) = neighbour else {
        graph.put_tile(tile);
        return;
    };
    neighbour.equalized[opposite.index()] = true;

    average_edge_images(&mut tile, &mut neighbour, edge);
    average_edge_heights(&mut tile, &mut neighbour, edge);
    trace!(tile = %key, neighbour = %neighbour.key, edge = ?edge, "Equalized edge");

    graph.put_tile(neighbour);
    graph.put_tile(tile);
}

fn average_edge_images(tile: &mut DestinationTile, neighbour: &mut DestinationTile, edge: Position) {
    let opposite = edge.opposite();
    let layers = tile.imagery.len().min(neighbour.imagery.len());
    for layer in 0..layers {
        let (Some(a), Some(b)) = (
            tile.imagery[layer].image.as_mut(),
            neighbour.imagery[layer].image.as_mut(),
        ) else {
            continue;
        };
        let length = if is_vertical(edge) { a.height() } else { a.width() };
        let other = if is_vertical(edge) { b.height() } else { b.width() };
        if length != other || length < 3 {
            continue;
        }

        for i in 1..length - 1 {
            let (ax, ay) = image_edge(edge, i, a.width(), a.height());
            let (bx, by) = image_edge(opposite, i, b.width(), b.height());
            let pa = a.rgb(ax, ay);
            let pb = b.rgb(bx, by);
            let mean = [0, 1, 2].map(|c| ((pa[c] as u16 + pb[c] as u16) / 2) as u8);
            a.set_rgb(ax, ay, mean);
            b.set_rgb(bx, by, mean);
        }
    }
}

fn average_edge_heights(tile: &mut DestinationTile, neighbour: &mut DestinationTile, edge: Position) {
    let opposite = edge.opposite();
    let (Some(a), Some(b)) = (
        tile.terrain.height_field.as_mut(),
        neighbour.terrain.height_field.as_mut(),
    ) else {
        return;
    };

    let length = if is_vertical(edge) { a.num_rows() } else { a.num_columns() };
    let other = if is_vertical(edge) { b.num_rows() } else { b.num_columns() };
    if length == other {
        for i in 1..length.saturating_sub(1) {
            let (ac, ar) = vertex_edge(edge, i, a.num_columns(), a.num_rows());
            let (bc, br) = vertex_edge(opposite, i, b.num_columns(), b.num_rows());
            let mean = (a.height(ac, ar) + b.height(bc, br)) * 0.5;
            a.set_height(ac, ar, mean);
            b.set_height(bc, br, mean);
        }
    }

    let mut gradients = Vec::with_capacity((length + other) as usize);
    for i in 0..length {
        let (c, r) = vertex_edge(edge, i, a.num_columns(), a.num_rows());
        gradients.push(a.gradient(c, r));
    }
    for i in 0..other {
        let (c, r) = vertex_edge(opposite, i, b.num_columns(), b.num_rows());
        gradients.push(b.gradient(c, r));
    }
    if let Some(delta) = HeightDelta::mean(&gradients) {
        tile.height_deltas[edge.index()] = Some(delta);
        neighbour.height_deltas[opposite.index()] = Some(delta);
    }
}
