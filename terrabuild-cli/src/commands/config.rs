//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` for
//! viewing and modifying the build settings file from the command line.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use terrabuild::config::ConfigKey;
use terrabuild::DataSetConfig;

use crate::error::CliError;

/// File name of the settings file inside the user config directory.
const CONFIG_FILE_NAME: &str = "config.ini";

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., dataset.num_levels)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., output.basename)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// `~/.config/terrabuild/config.ini` or the platform equivalent.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("terrabuild")
        .join(CONFIG_FILE_NAME)
}

/// Load `path`, falling back to defaults when the file does not exist yet.
pub fn load_or_default(path: &Path) -> Result<DataSetConfig, CliError> {
    if path.exists() {
        Ok(DataSetConfig::load(path)?)
    } else {
        Ok(DataSetConfig::default())
    }
}

/// Run a config subcommand against `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key, path),
        ConfigCommands::Set { key, value } => run_set(&key, &value, path),
        ConfigCommands::List => run_list(path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'terrabuild config list' to see available keys.",
            key
        ))
    })
}

fn run_get(key: &str, path: &Path) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = load_or_default(path)?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_set(key: &str, value: &str, path: &Path) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let mut config = load_or_default(path)?;
    set_value(&mut config, config_key, value)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::Config(format!("{}: {}", parent.display(), e)))?;
    }
    config.save(path)?;

    println!("Set {} = {}", config_key.name(), value);
    Ok(())
}

/// Apply one key and re-validate, so a bad value never reaches the file.
fn set_value(config: &mut DataSetConfig, key: ConfigKey, value: &str) -> Result<(), CliError> {
    key.set(config, value)?;
    config.validate()?;
    Ok(())
}

fn run_list(path: &Path) -> Result<(), CliError> {
    let config = load_or_default(path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&config);
        if value.is_empty() {
            println!("  {} = (not set)", key.key_name());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }
    Ok(())
}
