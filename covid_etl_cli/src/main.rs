mod cli;
mod display;
mod error;
mod prompt;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, RunCommand};
use covid_etl::config::Config;
use error::CliResult;
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";

fn main() -> Result<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let config: Config = match args.config.as_deref() {
        Some(path) => read_config_file(path)?,
        None => read_config_from_toml()?,
    };
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        command.run(config)?;
    }
    Ok(())
}

fn read_config_file(path: &Path) -> CliResult<Config> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

fn read_config_from_toml() -> CliResult<Config> {
    // Linux: ~/.config/covid-etl/config.toml
    // macOS: ~/Library/Application Support/covid-etl/config.toml
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(Config::default());
    };
    match read_config_file(&config_dir.join("covid-etl").join("config.toml")) {
        Err(error::CliError::IOError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(Config::default())
        }
        result => result,
    }
}
