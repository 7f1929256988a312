//! Top-level build errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::destination::{Position, TileKey};
use crate::emit::EmitError;
use crate::raster::{RasterError, WarpError};

/// Errors that abort a build.
///
/// Degraded conditions (an unreadable source, a missing transformer, a
/// flat tile) are logged and worked around instead of surfacing here.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Every configured source was dropped or none were configured.
    #[error("No usable sources")]
    NoSources,

    /// Neither configuration nor any source defines a coordinate system.
    #[error("No destination coordinate system could be determined")]
    NoCoordinateSystem,

    /// The destination extents are empty or inverted.
    #[error("Invalid destination extents: {0}")]
    InvalidExtents(String),

    /// A phase ran before the destination graph was computed.
    #[error("Destination graph has not been computed")]
    MissingDestination,

    /// Creating the temporary directory for warped sources failed.
    #[error("Failed to prepare temporary directory {path}: {source}")]
    TemporaryDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reprojection failed in a way that leaves no usable source.
    #[error("Reprojection failed: {0}")]
    Warp(#[from] WarpError),

    /// Reading a source window failed.
    #[error("Raster read failed: {0}")]
    Raster(#[from] RasterError),

    /// Writing a tile or group failed.
    #[error("Emit failed: {0}")]
    Emit(#[from] EmitError),

    /// Two tiles disagree about being neighbours.
    #[error("Tile {tile} lists {neighbour} at {position:?} but the link is not reciprocated")]
    NeighbourReciprocity {
        tile: TileKey,
        neighbour: TileKey,
        position: Position,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for build operations.
pub type BuildResult<T> = Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reciprocity_display() {
        let err = BuildError::NeighbourReciprocity {
            tile: TileKey::new(2, 1, 1),
            neighbour: TileKey::new(2, 2, 1),
            position: Position::Right,
        };
        let message = err.to_string();
        assert!(message.contains("L2 X1 Y1"));
        assert!(message.contains("Right"));
    }

    #[test]
    fn test_warp_error_converts() {
        let err: BuildError = WarpError::SuggestedOutput("bad grid".to_string()).into();
        assert!(matches!(err, BuildError::Warp(_)));
    }
}
