//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::Path;

use clap::Subcommand;
use edgelearn::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration (file values over defaults)
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init { force } => run_init(&config_file_path(), force),
    }
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

/// Show the effective configuration.
fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load_from(&path)?;

    if !path.exists() {
        println!("; {} not found, showing defaults", path.display());
        println!();
    }
    print!("{}", render(&config));
    Ok(())
}

fn render(config: &ConfigFile) -> String {
    let c = &config.controller;
    let prefix = if c.volume_mount_prefix.is_empty() {
        "(not set)"
    } else {
        c.volume_mount_prefix.as_str()
    };

    let mut out = String::new();
    out.push_str("[controller]\n");
    out.push_str(&format!("  volume_mount_prefix = {}\n", prefix));
    out.push_str(&format!("  tick_interval_secs = {}\n", c.tick_interval_secs));
    out.push_str(&format!("  dataset_interval_secs = {}\n", c.dataset_interval_secs));
    out.push_str(&format!("  resolve_interval_ms = {}\n", c.resolve_interval_ms));
    out.push_str(&format!("  resolve_attempts = {}\n", c.resolve_attempts));
    out.push_str(&format!("  eval_window_capacity = {}\n", c.eval_window_capacity));
    out.push_str(&format!(
        "  report_channel_capacity = {}\n",
        c.report_channel_capacity
    ));
    out.push('\n');
    out.push_str("[storage]\n");
    out.push_str(&format!("  directory = {}\n", config.storage.directory.display()));
    out.push('\n');
    out.push_str("[logging]\n");
    out.push_str(&format!("  file = {}\n", config.logging.file.display()));
    out
}

/// Write the default configuration to `path`.
fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if force {
        ConfigFile::default().save_to(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    if ConfigFile::ensure_exists_at(path)? {
        println!("Created configuration file at {}", path.display());
    } else {
        println!("Configuration file already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
    }
    Ok(())
}
