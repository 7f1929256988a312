//! Error types for raster access and warping.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`RasterService`](super::RasterService) or a
/// [`RasterDataset`](super::RasterDataset).
#[derive(Debug, Error)]
pub enum RasterError {
    /// The file could not be opened or decoded.
    #[error("Failed to open raster {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// The world-file sidecar is malformed.
    #[error("Invalid world file {path}: {reason}")]
    WorldFile { path: PathBuf, reason: String },

    /// A band index outside `0..band_count` was requested.
    #[error("Band {band} out of range (raster has {count} bands)")]
    BandOutOfRange { band: usize, count: usize },

    /// A read window extends beyond the raster.
    #[error("Window {x},{y} {width}x{height} exceeds raster size {raster_width}x{raster_height}")]
    WindowOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        raster_width: u32,
        raster_height: u32,
    },

    /// The in-memory band data does not match the raster size.
    #[error("Band {band} holds {actual} values, expected {expected}")]
    BandSize {
        band: usize,
        expected: usize,
        actual: usize,
    },

    /// I/O error while reading a sidecar file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`WarpService`](super::WarpService).
#[derive(Debug, Error)]
pub enum WarpError {
    /// No transformation exists between the two coordinate systems.
    ///
    /// Callers treat this as non-fatal and keep the unreprojected source.
    #[error("Cannot create transformer from {source_cs} to {target_cs}")]
    TransformerCreation {
        source_cs: String,
        target_cs: String,
    },

    /// The suggested output grid could not be computed.
    #[error("Failed to compute suggested warp output: {0}")]
    SuggestedOutput(String),

    /// Reading the input raster failed.
    #[error("Failed to read warp input: {0}")]
    Raster(#[from] RasterError),

    /// Writing the warped raster failed.
    #[error("I/O error writing warped raster: {0}")]
    Io(#[from] std::io::Error),
}

impl WarpError {
    /// Returns true for failures that leave the original source usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WarpError::TransformerCreation { .. })
    }
}
