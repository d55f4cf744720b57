//! CLI runner for common setup.
//!
//! Encapsulates config loading and logging initialization so command
//! handlers start from a ready environment.

use crate::error::CliError;
use edgelearn::config::ConfigFile;
use edgelearn::logging::{default_log_file, init_logging, LoggingGuard};
use tracing::info;

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner with optional debug logging.
    ///
    /// Console logging goes to stderr; stdout carries upstream messages only.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, defaults to debug-level logging if RUST_LOG is unset
    /// * `quiet` - When true, logs go to the log file only
    pub fn with_debug(debug_mode: bool, quiet: bool) -> Result<Self, CliError> {
        // Load config file (or use defaults if not present)
        let config = ConfigFile::load()?;

        let log_path = &config.logging.file;
        let log_dir = log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| ".".into());
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| default_log_file().to_string());

        let logging_guard = init_logging(&log_dir, &log_file, !quiet, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("edgelearn v{}", edgelearn::VERSION);
        info!("edgelearn CLI: {} command", command);
    }
}
