//! Emitter errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while persisting tiles or groups.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Creating or writing a file failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding a tile image failed.
    #[error("Failed to encode image {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Serializing a descriptor failed.
    #[error("Failed to serialize descriptor: {0}")]
    Serialize(#[from] serde_json::Error),
}
