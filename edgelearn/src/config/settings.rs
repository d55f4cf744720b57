//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;
use std::time::Duration;

use crate::controller::ControllerConfig;
use crate::retry::RetryPolicy;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Job controller settings
    pub controller: ControllerSettings,
    /// Job definition storage
    pub storage: StorageSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// `[controller]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Local mount point of the volume workers see as `/`
    pub volume_mount_prefix: String,
    /// Seconds between phase ticks
    pub tick_interval_secs: u64,
    /// Seconds between dataset ingestions
    pub dataset_interval_secs: u64,
    /// Milliseconds between resource lookups at job start
    pub resolve_interval_ms: u64,
    /// Lookups before a missing resource fails the job start
    pub resolve_attempts: u32,
    /// Eval windows retained per job
    pub eval_window_capacity: usize,
    /// Worker reports queued before ingress waits
    pub report_channel_capacity: usize,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    /// Directory job definitions are persisted in
    pub directory: PathBuf,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Runtime controller configuration from the `[controller]` section.
    pub fn to_controller_config(&self) -> ControllerConfig {
        let c = &self.controller;
        ControllerConfig::new()
            .with_tick_interval(Duration::from_secs(c.tick_interval_secs))
            .with_dataset_interval(Duration::from_secs(c.dataset_interval_secs))
            .with_resolve_policy(RetryPolicy::new(
                Duration::from_millis(c.resolve_interval_ms),
                c.resolve_attempts,
            ))
            .with_eval_window_capacity(c.eval_window_capacity)
            .with_volume_mount_prefix(c.volume_mount_prefix.clone())
            .with_report_channel_capacity(c.report_channel_capacity)
    }
}
