//! Default values for all configuration settings.

use super::file::config_directory;
use super::settings::*;

/// Default seconds between phase ticks.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

/// Default seconds between dataset ingestions.
pub const DEFAULT_DATASET_INTERVAL_SECS: u64 = 10;

/// Default milliseconds between resource lookups at job start.
pub const DEFAULT_RESOLVE_INTERVAL_MS: u64 = 100;

/// Default lookups before a missing resource fails the job start (30s).
pub const DEFAULT_RESOLVE_ATTEMPTS: u32 = 300;

/// Default eval windows retained per job.
pub const DEFAULT_EVAL_WINDOW_CAPACITY: usize = crate::sample::DEFAULT_EVAL_WINDOW_CAPACITY;

/// Default worker report queue capacity.
pub const DEFAULT_REPORT_CHANNEL_CAPACITY: usize =
    crate::controller::DEFAULT_REPORT_CHANNEL_CAPACITY;

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = config_directory();

        Self {
            controller: ControllerSettings {
                volume_mount_prefix: String::new(),
                tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
                dataset_interval_secs: DEFAULT_DATASET_INTERVAL_SECS,
                resolve_interval_ms: DEFAULT_RESOLVE_INTERVAL_MS,
                resolve_attempts: DEFAULT_RESOLVE_ATTEMPTS,
                eval_window_capacity: DEFAULT_EVAL_WINDOW_CAPACITY,
                report_channel_capacity: DEFAULT_REPORT_CHANNEL_CAPACITY,
            },
            storage: StorageSettings {
                directory: config_dir.join("jobs"),
            },
            logging: LoggingSettings {
                file: config_dir.join("edgelearn.log"),
            },
        }
    }
}
