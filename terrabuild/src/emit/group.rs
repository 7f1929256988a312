//! LOD group descriptors.
//!
//! A group lists what to show at which viewing distance. Paged databases
//! split the tree into one file per composite's children:
//!
//! ```text
//! output.json                  root: own tiles [cutoff, far], subtile [0, cutoff]
//! output_L0_X0_Y0_subtile.json children of the root, same layout per child
//! output_L1_X0_Y0_subtile.json ...
//! ```
//!
//! where `cutoff = radius * radius_to_max_visible_distance_ratio` and `far`
//! is the top level's maximum visible distance. Childless nodes show their
//! tiles over `[0, far]`.

use serde::{Deserialize, Serialize};

use super::root_file_name;
use crate::config::DataSetConfig;
use crate::destination::{CompositeId, CompositeKind, DestinationGraph};

/// What a group entry shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupContent {
    /// Tiles by name.
    Tiles(Vec<String>),
    /// Another group file, loaded on demand.
    File(String),
}

/// One child of a group with its visible range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub content: GroupContent,
    pub center: (f64, f64),
    pub radius: f64,
    /// `(min, max)` viewing distance.
    pub range: (f64, f64),
}

/// A group file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedGroup {
    pub file_name: String,
    pub kind: CompositeKind,
    pub center: (f64, f64),
    pub radius: f64,
    pub entries: Vec<GroupEntry>,
}

fn tile_names(graph: &DestinationGraph, id: CompositeId) -> Vec<String> {
    graph
        .composite(id)
        .tiles
        .iter()
        .filter_map(|key| graph.tile(*key).map(|tile| tile.name.clone()))
        .collect()
}

/// Entries presenting composite `id` in a paged database.
fn paged_entries(graph: &DestinationGraph, id: CompositeId, config: &DataSetConfig) -> Vec<GroupEntry> {
    let composite = graph.composite(id);
    let center = composite.extents.center();
    let radius = composite.extents.radius();
    let far = config.maximum_visible_distance_of_top_level;
    let tiles = GroupContent::Tiles(tile_names(graph, id));

    if composite.is_leaf() {
        return vec![GroupEntry {
            content: tiles,
            center,
            radius,
            range: (0.0, far),
        }];
    }

    let cutoff = radius * config.radius_to_max_visible_distance_ratio;
    vec![
        GroupEntry {
            content: tiles,
            center,
            radius,
            range: (cutoff, far),
        },
        GroupEntry {
            content: GroupContent::File(composite.sub_tile_name(&config.extension)),
            center,
            radius,
            range: (0.0, cutoff),
        },
    ]
}

/// The root file of a paged database.
pub fn paged_root_group(graph: &DestinationGraph, config: &DataSetConfig) -> Option<EmittedGroup> {
    let root = graph.root()?;
    let composite = graph.composite(root);
    Some(EmittedGroup {
        file_name: root_file_name(&config.basename, &config.extension),
        kind: composite.kind,
        center: composite.extents.center(),
        radius: composite.extents.radius(),
        entries: paged_entries(graph, root, config),
    })
}

/// The group file holding the children of composite `id`.
pub fn sub_tile_group(graph: &DestinationGraph, id: CompositeId, config: &DataSetConfig) -> EmittedGroup {
    let composite = graph.composite(id);
    EmittedGroup {
        file_name: composite.sub_tile_name(&config.extension),
        kind: CompositeKind::Group,
        center: composite.extents.center(),
        radius: composite.extents.radius(),
        entries: composite
            .children
            .iter()
            .flat_map(|child| paged_entries(graph, *child, config))
            .collect(),
    }
}

/// Group file of composite `id` in a single-tree database.
///
/// Own tiles are visible from the farthest child's switch distance out to
/// the composite's own limit; children are referenced by file.
pub fn tree_group(graph: &DestinationGraph, id: CompositeId, config: &DataSetConfig) -> EmittedGroup {
    let composite = graph.composite(id);
    let center = composite.extents.center();
    let radius = composite.extents.radius();

    let (file_name, far) = if composite.is_root() {
        (
            root_file_name(&config.basename, &config.extension),
            config.maximum_visible_distance_of_top_level,
        )
    } else {
        (
            format!("{}{}", composite.name, config.extension),
            composite.max_visible_distance,
        )
    };

    let cutoff = composite
        .children
        .iter()
        .map(|child| graph.composite(*child).max_visible_distance)
        .fold(0.0, f64::max);

    let mut entries = vec![GroupEntry {
        content: GroupContent::Tiles(tile_names(graph, id)),
        center,
        radius,
        range: (cutoff, far),
    }];

    for child in &composite.children {
        let child = graph.composite(*child);
        entries.push(GroupEntry {
            content: GroupContent::File(format!("{}{}", child.name, config.extension)),
            center: child.extents.center(),
            radius: child.extents.radius(),
            range: (0.0, child.max_visible_distance),
        });
    }

    EmittedGroup {
        file_name,
        kind: composite.kind,
        center,
        radius,
        entries,
    }
}
