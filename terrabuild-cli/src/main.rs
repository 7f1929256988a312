//! Terrabuild CLI - build streamed terrain databases from the command line.

mod commands;
mod error;
mod logging;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::build::BuildArgs;
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "terrabuild", version, about = "Build streamed terrain tile databases")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(short = 'c', long = "config", global = true, value_name = "INI")]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a database from imagery, elevation and model sources
    Build(BuildArgs),

    /// View or modify settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    let _guard = logging::init(cli.verbose, cli.log_file.as_deref())?;
    let config_path = cli.settings.unwrap_or_else(commands::config::default_config_path);

    match cli.command {
        Commands::Build(args) => commands::build::run(args, &config_path),
        Commands::Config { command } => commands::config::run(command, &config_path),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "terrabuild",
            "build",
            "--image",
            "ortho.png@1",
            "--height",
            "dem.png",
            "--output",
            "out",
            "--levels",
            "4",
            "--mode",
            "single",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.images, vec!["ortho.png@1".to_string()]);
        assert_eq!(args.levels, Some(4));
        assert_eq!(args.mode, Some(commands::build::ModeArg::Single));
    }

    #[test]
    fn test_parse_config_get() {
        let cli = Cli::try_parse_from(["terrabuild", "--config", "x.ini", "config", "get", "dataset.num_levels"]).unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("x.ini")));
        assert!(matches!(cli.command, Commands::Config { command: ConfigCommands::Get { .. } }));
    }
}
