//! edgelearn CLI - Command-line interface
//!
//! Runs the edge-side incremental learning controller locally. Job
//! definitions and worker reports arrive on stdin; status messages for the
//! control plane leave on stdout.

mod commands;
mod error;
mod resources;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "edgelearn")]
#[command(version, about = "Edge-side incremental learning job controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller, reading JSON lines from stdin
    Run {
        /// Resource manifest naming the datasets and models jobs may use
        #[arg(long)]
        resources: PathBuf,

        /// Enable debug logging (RUST_LOG still takes precedence)
        #[arg(long)]
        debug: bool,

        /// Log to the log file only
        #[arg(long, short)]
        quiet: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            resources,
            debug,
            quiet,
        } => commands::run::run(RunArgs {
            resources,
            debug,
            quiet,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
