//! User configuration loaded from `~/.edgelearn/config.ini`.
//!
//! - [`settings`] - one struct per INI section
//! - [`defaults`] - default values and `ConfigFile::default()`
//! - `parser` - INI to [`ConfigFile`]
//! - `writer` - [`ConfigFile`] to commented INI
//!
//! # Example
//!
//! ```
//! use edgelearn::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let controller = config.to_controller_config();
//! assert_eq!(controller.eval_window_capacity(), 5);
//! ```

pub mod defaults;
mod file;
mod parser;
pub mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, ControllerSettings, LoggingSettings, StorageSettings};
