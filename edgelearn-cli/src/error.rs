//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use edgelearn::config::ConfigFileError;
use edgelearn::manager::ManagerError;
use edgelearn::store::StoreError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read or parse the resource manifest
    Resources { path: String, reason: String },
    /// Failed to open the job store
    Store(StoreError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Job manager error
    Manager(ManagerError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Resources { .. } = self {
            eprintln!();
            eprintln!("The resource manifest is a JSON file of the form:");
            eprintln!("  {{");
            eprintln!("    \"datasets\": [{{\"namespace\": \"default\", \"name\": \"data\", \"format\": \"txt\", \"index\": \"samples.txt\"}}],");
            eprintln!("    \"models\": [{{\"namespace\": \"default\", \"name\": \"model\", \"format\": \"pb\", \"url\": \"/models/model.pb\"}}]");
            eprintln!("  }}");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Resources { path, reason } => {
                write!(f, "Invalid resource manifest '{}': {}", path, reason)
            }
            CliError::Store(e) => write!(f, "Failed to open job store: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Manager(e) => write!(f, "Job manager error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Store(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Manager(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        CliError::Manager(e)
    }
}
