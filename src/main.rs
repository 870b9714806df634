//! Command line tool for the AVRCP target configuration.

use std::{error::Error, path::PathBuf};

use avrcp_target::{
    config::{Config, ConfigPaths},
    tracing_config,
};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "avrcp-target")]
#[command(about = "Inspect and validate the AVRCP target configuration")]
struct Cli {
    /// Configuration file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file location
    Path,
    /// Print the JSON schema of the configuration
    Schema,
    /// Load and validate the configuration
    Check {
        /// Also write the log to a daily rotated file in the log directory
        #[arg(long)]
        log_file: bool,
    },
}

fn config_path(cli: &Cli) -> Result<PathBuf, Box<dyn Error>> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Ok(ConfigPaths::main_config()?),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let Commands::Config { action } = &cli.command;
    match action {
        ConfigAction::Show => {
            let config = Config::load_from(&config_path(&cli)?)?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path(&cli)?.display());
        }
        ConfigAction::Schema => {
            let schema = schemars::schema_for!(Config);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        ConfigAction::Check { log_file } => {
            let path = config_path(&cli)?;
            let config = Config::load_from(&path)?;
            let _guard = if *log_file {
                Some(tracing_config::init_with_file(config.general.log_level)?)
            } else {
                tracing_config::init(config.general.log_level)?;
                None
            };
            info!(path = %path.display(), "Configuration is valid");
            println!("{}: ok", path.display());
        }
    }

    Ok(())
}
