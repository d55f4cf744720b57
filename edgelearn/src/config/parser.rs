//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [controller] section
    if let Some(section) = ini.section(Some("controller")) {
        if let Some(v) = section.get("volume_mount_prefix") {
            config.controller.volume_mount_prefix = v.trim().to_string();
        }
        if let Some(v) = section.get("tick_interval_secs") {
            config.controller.tick_interval_secs =
                parse_positive("controller", "tick_interval_secs", v, "seconds")?;
        }
        if let Some(v) = section.get("dataset_interval_secs") {
            config.controller.dataset_interval_secs =
                parse_positive("controller", "dataset_interval_secs", v, "seconds")?;
        }
        if let Some(v) = section.get("resolve_interval_ms") {
            config.controller.resolve_interval_ms =
                parse_positive("controller", "resolve_interval_ms", v, "milliseconds")?;
        }
        if let Some(v) = section.get("resolve_attempts") {
            config.controller.resolve_attempts =
                parse_positive("controller", "resolve_attempts", v, "attempts")?;
        }
        if let Some(v) = section.get("eval_window_capacity") {
            config.controller.eval_window_capacity =
                parse_positive("controller", "eval_window_capacity", v, "windows")?;
        }
        if let Some(v) = section.get("report_channel_capacity") {
            config.controller.report_channel_capacity =
                parse_positive("controller", "report_channel_capacity", v, "reports")?;
        }
    }

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.directory = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_positive<T>(section: &str, key: &str, value: &str, unit: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    let invalid = || ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: format!("must be a positive integer ({})", unit),
    };
    let parsed: T = value.trim().parse().map_err(|_| invalid())?;
    if parsed <= T::default() {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
