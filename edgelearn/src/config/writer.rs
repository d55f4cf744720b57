//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let c = &config.controller;
    format!(
        r#"[controller]
; Local mount point of the volume workers see as "/". Paths sent to workers
; have it stripped; paths reported by workers get it prepended.
; Leave empty when the controller and workers share a file system view.
volume_mount_prefix = {}
; Seconds between phase ticks of each job (default: 10)
tick_interval_secs = {}
; Seconds between dataset ingestions of each job (default: 10)
dataset_interval_secs = {}
; Datasets and models referenced by a new job may not be synced yet.
; The job start polls every resolve_interval_ms, up to resolve_attempts times
; (default: 100ms x 300 = 30s)
resolve_interval_ms = {}
resolve_attempts = {}
; Eval sample windows kept per job, one per version (default: 5)
eval_window_capacity = {}
; Worker reports queued before ingress waits (default: 1024)
report_channel_capacity = {}

[storage]
; Directory job definitions are persisted in
directory = {}

[logging]
; Log file path (cleared on start)
file = {}
"#,
        c.volume_mount_prefix,
        c.tick_interval_secs,
        c.dataset_interval_secs,
        c.resolve_interval_ms,
        c.resolve_attempts,
        c.eval_window_capacity,
        c.report_channel_capacity,
        path_to_string(&config.storage.directory),
        path_to_string(&config.logging.file),
    )
}

fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse_ini;
    use super::*;
    use ini::Ini;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.controller.volume_mount_prefix = "/rootfs".to_string();
        config.controller.tick_interval_secs = 3;

        let content = to_config_string(&config);
        let parsed = parse_ini(&Ini::load_from_str(&content).unwrap()).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_written_config_is_commented() {
        let content = to_config_string(&ConfigFile::default());
        assert!(content.contains("[controller]"));
        assert!(content.contains("; Seconds between phase ticks"));
    }
}
