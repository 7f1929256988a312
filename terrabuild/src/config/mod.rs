//! Build configuration.
//!
//! [`DataSetConfig`] holds every tunable of a build. It is created with
//! defaults, adjusted with `with_*` builders or loaded from an INI file, and
//! then passed by reference to each phase; nothing reads global state.
//!
//! # INI Layout
//!
//! ```ini
//! [dataset]
//! max_image_tile_size = 256
//! max_terrain_tile_size = 64
//! num_levels = 30
//! database_mode = paged
//! destination_coordinate_system = EPSG:32632
//!
//! [output]
//! basename = output
//! extension = .json
//! temporary_directory = /tmp/terrabuild
//! ```
//!
//! Every recognised key is listed by [`ConfigKey::all`]. Missing keys keep
//! their defaults.

mod error;
mod keys;

pub use error::ConfigError;
pub use keys::ConfigKey;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::destination::PixelFormat;
use crate::extents::GeospatialExtents;
use crate::spatial::CoordinateSystem;

/// Default maximum edge length of a tile image in pixels.
pub const DEFAULT_MAX_IMAGE_TILE_SIZE: u32 = 256;

/// Default maximum edge length of a tile height field in samples.
pub const DEFAULT_MAX_TERRAIN_TILE_SIZE: u32 = 64;

/// Default upper bound on quadtree depth.
pub const DEFAULT_NUM_LEVELS: u32 = 30;

/// Default multiplier applied to raw heights.
pub const DEFAULT_VERTICAL_SCALE: f32 = 1.0;

/// Default skirt depth as a fraction of the tile radius.
pub const DEFAULT_SKIRT_RATIO: f32 = 0.02;

/// Default factor applied to tile resolution before comparing with sources.
pub const DEFAULT_RESOLUTION_SENSITIVITY: f64 = 0.9;

/// Default ratio of root visibility distance to root radius.
pub const DEFAULT_RADIUS_TO_MAX_VISIBLE_DISTANCE_RATIO: f64 = 7.0;

/// Default far range of the top level.
pub const DEFAULT_MAXIMUM_VISIBLE_DISTANCE_OF_TOP_LEVEL: f64 = 1e10;

/// Default output base name.
pub const DEFAULT_BASENAME: &str = "output";

/// Default extension of group files.
pub const DEFAULT_EXTENSION: &str = ".json";

/// How the populated tree is streamed to the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseMode {
    /// Populate the whole tree, then emit it as one LOD hierarchy.
    SingleTree,
    /// Populate row by row and emit paged sub-tile groups.
    #[default]
    Paged,
}

impl FromStr for DatabaseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" | "singletree" | "single_tree" => Ok(DatabaseMode::SingleTree),
            "paged" => Ok(DatabaseMode::Paged),
            _ => Err(ConfigError::invalid("dataset.database_mode", s, "expected 'single' or 'paged'")),
        }
    }
}

impl fmt::Display for DatabaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseMode::SingleTree => write!(f, "single"),
            DatabaseMode::Paged => write!(f, "paged"),
        }
    }
}

/// How elevation samples are drawn into a height field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeightSampling {
    /// Probe each vertex bilinearly in the raw source window.
    #[default]
    Bilinear,
    /// Read the window resized to the destination grid in one call.
    Bulk,
}

impl FromStr for HeightSampling {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bilinear" => Ok(HeightSampling::Bilinear),
            "bulk" => Ok(HeightSampling::Bulk),
            _ => Err(ConfigError::invalid("dataset.height_sampling", s, "expected 'bilinear' or 'bulk'")),
        }
    }
}

impl fmt::Display for HeightSampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeightSampling::Bilinear => write!(f, "bilinear"),
            HeightSampling::Bulk => write!(f, "bulk"),
        }
    }
}

impl FromStr for PixelFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rgb" => Ok(PixelFormat::Rgb),
            "rgba" => Ok(PixelFormat::Rgba),
            _ => Err(ConfigError::invalid("dataset.image_format", s, "expected 'rgb' or 'rgba'")),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Rgb => write!(f, "rgb"),
            PixelFormat::Rgba => write!(f, "rgba"),
        }
    }
}

/// Configuration of one build.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetConfig {
    pub max_image_tile_size: u32,
    pub max_terrain_tile_size: u32,
    /// Maximum number of quadtree levels, root included.
    pub num_levels: u32,
    pub vertical_scale: f32,
    pub skirt_ratio: f32,
    /// A tile axis is divided while `tile_res * sensitivity > source_res`.
    pub resolution_sensitivity: f64,
    pub database_mode: DatabaseMode,
    pub radius_to_max_visible_distance_ratio: f64,
    pub maximum_visible_distance_of_top_level: f64,
    pub image_format: PixelFormat,
    pub height_sampling: HeightSampling,
    /// Overrides the coordinate system taken from the first source.
    pub destination_coordinate_system: Option<CoordinateSystem>,
    /// Overrides the union of source extents.
    pub destination_extents: Option<GeospatialExtents>,
    /// Warp sources whose resolution lies outside their required range.
    pub reproject_to_required_resolution: bool,
    pub basename: String,
    pub extension: String,
    /// Where warped sources are written.
    pub temporary_directory: PathBuf,
}

impl Default for DataSetConfig {
    fn default() -> Self {
        Self {
            max_image_tile_size: DEFAULT_MAX_IMAGE_TILE_SIZE,
            max_terrain_tile_size: DEFAULT_MAX_TERRAIN_TILE_SIZE,
            num_levels: DEFAULT_NUM_LEVELS,
            vertical_scale: DEFAULT_VERTICAL_SCALE,
            skirt_ratio: DEFAULT_SKIRT_RATIO,
            resolution_sensitivity: DEFAULT_RESOLUTION_SENSITIVITY,
            database_mode: DatabaseMode::default(),
            radius_to_max_visible_distance_ratio: DEFAULT_RADIUS_TO_MAX_VISIBLE_DISTANCE_RATIO,
            maximum_visible_distance_of_top_level: DEFAULT_MAXIMUM_VISIBLE_DISTANCE_OF_TOP_LEVEL,
            image_format: PixelFormat::default(),
            height_sampling: HeightSampling::default(),
            destination_coordinate_system: None,
            destination_extents: None,
            reproject_to_required_resolution: false,
            basename: DEFAULT_BASENAME.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            temporary_directory: std::env::temp_dir().join("terrabuild"),
        }
    }
}

impl DataSetConfig {
    pub fn with_max_image_tile_size(mut self, size: u32) -> Self {
        self.max_image_tile_size = size;
        self
    }

    pub fn with_max_terrain_tile_size(mut self, size: u32) -> Self {
        self.max_terrain_tile_size = size;
        self
    }

    pub fn with_num_levels(mut self, num_levels: u32) -> Self {
        self.num_levels = num_levels;
        self
    }

    pub fn with_vertical_scale(mut self, scale: f32) -> Self {
        self.vertical_scale = scale;
        self
    }

    pub fn with_skirt_ratio(mut self, ratio: f32) -> Self {
        self.skirt_ratio = ratio;
        self
    }

    pub fn with_resolution_sensitivity(mut self, sensitivity: f64) -> Self {
        self.resolution_sensitivity = sensitivity;
        self
    }

    pub fn with_database_mode(mut self, mode: DatabaseMode) -> Self {
        self.database_mode = mode;
        self
    }

    pub fn with_image_format(mut self, format: PixelFormat) -> Self {
        self.image_format = format;
        self
    }

    pub fn with_height_sampling(mut self, sampling: HeightSampling) -> Self {
        self.height_sampling = sampling;
        self
    }

    pub fn with_destination_coordinate_system(mut self, cs: CoordinateSystem) -> Self {
        self.destination_coordinate_system = Some(cs);
        self
    }

    pub fn with_destination_extents(mut self, extents: GeospatialExtents) -> Self {
        self.destination_extents = Some(extents);
        self
    }

    pub fn with_reproject_to_required_resolution(mut self, enabled: bool) -> Self {
        self.reproject_to_required_resolution = enabled;
        self
    }

    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = basename.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_temporary_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temporary_directory = dir.into();
        self
    }

    /// Reject values that would make a build meaningless or non-terminating.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_image_tile_size == 0 {
            return Err(ConfigError::invalid(
                ConfigKey::MaxImageTileSize.name(),
                self.max_image_tile_size,
                "must be greater than zero",
            ));
        }
        if self.max_terrain_tile_size == 0 {
            return Err(ConfigError::invalid(
                ConfigKey::MaxTerrainTileSize.name(),
                self.max_terrain_tile_size,
                "must be greater than zero",
            ));
        }
        if self.num_levels == 0 {
            return Err(ConfigError::invalid(ConfigKey::NumLevels.name(), self.num_levels, "must be at least 1"));
        }
        if !(self.resolution_sensitivity > 0.0) {
            return Err(ConfigError::invalid(
                ConfigKey::ResolutionSensitivity.name(),
                self.resolution_sensitivity,
                "must be positive",
            ));
        }
        if !(self.radius_to_max_visible_distance_ratio > 0.0) {
            return Err(ConfigError::invalid(
                ConfigKey::RadiusToMaxVisibleDistanceRatio.name(),
                self.radius_to_max_visible_distance_ratio,
                "must be positive",
            ));
        }
        if self.basename.trim().is_empty() {
            return Err(ConfigError::invalid(ConfigKey::Basename.name(), &self.basename, "must not be empty"));
        }
        Ok(())
    }

    /// Load from an INI file, starting from defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_ini(&ini)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Build from parsed INI contents and validate the result.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Render every key into INI form. Unset optional keys are omitted.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section())).set(key.key_name(), value);
            }
        }
        ini
    }

    /// Write to an INI file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.to_ini().write_to_file(path).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
