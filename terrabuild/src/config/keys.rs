//! Recognised configuration keys.

use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, DataSetConfig};
use crate::spatial::CoordinateSystem;

/// A `section.key` configuration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    MaxImageTileSize,
    MaxTerrainTileSize,
    NumLevels,
    VerticalScale,
    SkirtRatio,
    ResolutionSensitivity,
    DatabaseMode,
    RadiusToMaxVisibleDistanceRatio,
    MaximumVisibleDistanceOfTopLevel,
    ImageFormat,
    HeightSampling,
    DestinationCoordinateSystem,
    ReprojectToRequiredResolution,
    Basename,
    Extension,
    TemporaryDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::MaxImageTileSize,
            ConfigKey::MaxTerrainTileSize,
            ConfigKey::NumLevels,
            ConfigKey::VerticalScale,
            ConfigKey::SkirtRatio,
            ConfigKey::ResolutionSensitivity,
            ConfigKey::DatabaseMode,
            ConfigKey::RadiusToMaxVisibleDistanceRatio,
            ConfigKey::MaximumVisibleDistanceOfTopLevel,
            ConfigKey::ImageFormat,
            ConfigKey::HeightSampling,
            ConfigKey::DestinationCoordinateSystem,
            ConfigKey::ReprojectToRequiredResolution,
            ConfigKey::Basename,
            ConfigKey::Extension,
            ConfigKey::TemporaryDirectory,
        ]
    }

    /// Full name, `section.key`.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::MaxImageTileSize => "dataset.max_image_tile_size",
            ConfigKey::MaxTerrainTileSize => "dataset.max_terrain_tile_size",
            ConfigKey::NumLevels => "dataset.num_levels",
            ConfigKey::VerticalScale => "dataset.vertical_scale",
            ConfigKey::SkirtRatio => "dataset.skirt_ratio",
            ConfigKey::ResolutionSensitivity => "dataset.resolution_sensitivity",
            ConfigKey::DatabaseMode => "dataset.database_mode",
            ConfigKey::RadiusToMaxVisibleDistanceRatio => "dataset.radius_to_max_visible_distance_ratio",
            ConfigKey::MaximumVisibleDistanceOfTopLevel => "dataset.maximum_visible_distance_of_top_level",
            ConfigKey::ImageFormat => "dataset.image_format",
            ConfigKey::HeightSampling => "dataset.height_sampling",
            ConfigKey::DestinationCoordinateSystem => "dataset.destination_coordinate_system",
            ConfigKey::ReprojectToRequiredResolution => "dataset.reproject_to_required_resolution",
            ConfigKey::Basename => "output.basename",
            ConfigKey::Extension => "output.extension",
            ConfigKey::TemporaryDirectory => "output.temporary_directory",
        }
    }

    /// INI section.
    pub fn section(&self) -> &'static str {
        self.name().split_once('.').map_or("", |(section, _)| section)
    }

    /// Key within the section.
    pub fn key_name(&self) -> &'static str {
        self.name().split_once('.').map_or("", |(_, key)| key)
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &DataSetConfig) -> String {
        match self {
            ConfigKey::MaxImageTileSize => config.max_image_tile_size.to_string(),
            ConfigKey::MaxTerrainTileSize => config.max_terrain_tile_size.to_string(),
            ConfigKey::NumLevels => config.num_levels.to_string(),
            ConfigKey::VerticalScale => config.vertical_scale.to_string(),
            ConfigKey::SkirtRatio => config.skirt_ratio.to_string(),
            ConfigKey::ResolutionSensitivity => config.resolution_sensitivity.to_string(),
            ConfigKey::DatabaseMode => config.database_mode.to_string(),
            ConfigKey::RadiusToMaxVisibleDistanceRatio => config.radius_to_max_visible_distance_ratio.to_string(),
            ConfigKey::MaximumVisibleDistanceOfTopLevel => config.maximum_visible_distance_of_top_level.to_string(),
            ConfigKey::ImageFormat => config.image_format.to_string(),
            ConfigKey::HeightSampling => config.height_sampling.to_string(),
            ConfigKey::DestinationCoordinateSystem => config
                .destination_coordinate_system
                .as_ref()
                .map(|cs| cs.definition().to_string())
                .unwrap_or_default(),
            ConfigKey::ReprojectToRequiredResolution => config.reproject_to_required_resolution.to_string(),
            ConfigKey::Basename => config.basename.clone(),
            ConfigKey::Extension => config.extension.clone(),
            ConfigKey::TemporaryDirectory => config.temporary_directory.display().to_string(),
        }
    }

    /// Parse `value` and store it.
    pub fn set(&self, config: &mut DataSetConfig, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::MaxImageTileSize => config.max_image_tile_size = self.parse(value)?,
            ConfigKey::MaxTerrainTileSize => config.max_terrain_tile_size = self.parse(value)?,
            ConfigKey::NumLevels => config.num_levels = self.parse(value)?,
            ConfigKey::VerticalScale => config.vertical_scale = self.parse(value)?,
            ConfigKey::SkirtRatio => config.skirt_ratio = self.parse(value)?,
            ConfigKey::ResolutionSensitivity => config.resolution_sensitivity = self.parse(value)?,
            ConfigKey::DatabaseMode => config.database_mode = value.parse()?,
            ConfigKey::RadiusToMaxVisibleDistanceRatio => {
                config.radius_to_max_visible_distance_ratio = self.parse(value)?
            }
            ConfigKey::MaximumVisibleDistanceOfTopLevel => {
                config.maximum_visible_distance_of_top_level = self.parse(value)?
            }
            ConfigKey::ImageFormat => config.image_format = value.parse()?,
            ConfigKey::HeightSampling => config.height_sampling = value.parse()?,
            ConfigKey::DestinationCoordinateSystem => {
                config.destination_coordinate_system =
                    (!value.is_empty()).then(|| CoordinateSystem::new(value));
            }
            ConfigKey::ReprojectToRequiredResolution => {
                config.reproject_to_required_resolution = match value.to_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" => true,
                    "false" | "no" | "off" | "0" => false,
                    _ => return Err(ConfigError::invalid(self.name(), value, "expected a boolean")),
                }
            }
            ConfigKey::Basename => config.basename = value.to_string(),
            ConfigKey::Extension => config.extension = value.to_string(),
            ConfigKey::TemporaryDirectory => config.temporary_directory = PathBuf::from(value),
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        value
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(self.name(), value, e.to_string()))
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
