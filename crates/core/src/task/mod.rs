//! The scheduled probe task, its single-flight runner and daily schedule.

mod probe_task;
mod runner;
mod schedule;

pub use probe_task::{
    default_triggers, ProbeTask, TaskError, TaskReport, TaskTrigger, TriggerSource,
    TASK_CATEGORY, TASK_DESCRIPTION, TASK_KEY, TASK_NAME,
};
pub use runner::{RunnerError, RunnerStatus, TaskRunner};
pub use schedule::{next_daily_run, parse_time_of_day, ScheduleConfig, DEFAULT_DAILY_AT};
