//! `hzkube config`: show and set configuration values.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::domain::validate_config_key;
use crate::output::json;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Print one configuration value
    Get {
        /// Configuration key, e.g. vswitch.subnet
        key: String,
    },
    /// Set configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
    /// Print the config file location
    Path,
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the key or value is invalid or the file cannot be
/// read or written.
pub fn run(app: &AppContext, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => show_config(app),
        ConfigCommand::Get { key } => get_config(app, &key),
        ConfigCommand::Set { key, value } => set_config(app, &key, &value),
        ConfigCommand::Path => {
            let path = app.config_store.path();
            if app.is_json() {
                json::print(&serde_json::json!({ "path": path }))?;
            } else {
                println!("{}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn show_config(app: &AppContext) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    if app.is_json() {
        json::print(&config)?;
    } else {
        let yaml = serde_yaml::to_string(&config).context("cannot serialize config")?;
        app.output
            .header(&format!("Configuration ({})", app.config_store.path().display()));
        print!("{yaml}");
    }
    Ok(ExitCode::SUCCESS)
}

fn get_config(app: &AppContext, key: &str) -> Result<ExitCode> {
    validate_config_key(key)?;
    let value = app.config_store.load()?.get(key)?;
    if app.is_json() {
        json::print(&serde_json::json!({ "key": key, "value": value }))?;
    } else {
        println!("{value}");
    }
    Ok(ExitCode::SUCCESS)
}

fn set_config(app: &AppContext, key: &str, value: &str) -> Result<ExitCode> {
    validate_config_key(key)?;
    let mut config = app.config_store.load()?;
    config.set(key, value)?;
    app.config_store.save(&config)?;
    if app.is_json() {
        json::print(&serde_json::json!({ "key": key, "value": config.get(key)? }))?;
    } else {
        app.output.success(&format!("Set {key} = {value}"));
    }
    Ok(ExitCode::SUCCESS)
}
