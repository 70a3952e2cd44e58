use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Library roots have a path and unique ids
/// - Deletion threshold is not negative
/// - Schedule time parses as `HH:MM`
///
/// Probe knobs out of range are clamped at use, not rejected.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let mut ids = HashSet::new();
    for root in &config.library.roots {
        if root.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "library root {} has no path",
                root.id
            )));
        }
        if !ids.insert(root.id) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate library id {}",
                root.id
            )));
        }
    }

    let threshold = config.probe.delete_failure_threshold;
    if threshold.is_nan() || threshold < 0.0 {
        return Err(ConfigError::ValidationError(
            "probe.delete_failure_threshold cannot be negative".to_string(),
        ));
    }

    if let Err(e) = config.schedule.time_of_day() {
        return Err(ConfigError::ValidationError(format!(
            "schedule.daily_at '{}' is not a valid HH:MM time: {}",
            config.schedule.daily_at, e
        )));
    }

    Ok(())
}
