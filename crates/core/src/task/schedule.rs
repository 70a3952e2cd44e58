//! Daily trigger configuration and next-run computation.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Default time of day of the daily run.
pub const DEFAULT_DAILY_AT: &str = "04:00";

/// Daily schedule of the probe task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether the daily trigger is active.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Local wall-clock time, `HH:MM`.
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
}

fn default_enabled() -> bool {
    true
}

fn default_daily_at() -> String {
    DEFAULT_DAILY_AT.to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            daily_at: default_daily_at(),
        }
    }
}

impl ScheduleConfig {
    /// Parses `daily_at`.
    pub fn time_of_day(&self) -> Result<NaiveTime, chrono::ParseError> {
        parse_time_of_day(&self.daily_at)
    }
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
}

/// Next occurrence of `at` strictly after `now`.
pub fn next_daily_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}
