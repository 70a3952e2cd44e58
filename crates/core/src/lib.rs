pub mod catchup;
pub mod cleanup;
pub mod config;
pub mod library;
pub mod metrics;
pub mod probe;
pub mod task;
pub mod testing;

pub use catchup::{CatchUpError, CatchUpQueue, CatchUpState, CatchUpStatus, CATCH_UP_DEBOUNCE};
pub use cleanup::{
    CleanupOutcome, DeleteOutcome, FailureGatedCleanup, FileDeleter, FsFileDeleter,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ServerConfig,
};
pub use library::{
    FsLibraryStore, Item, ItemId, ItemQuery, LibraryConfig, LibraryEvent, LibraryId,
    LibraryStore, StoreError, UnprobedItemSelector,
};
pub use probe::{
    BatchConfig, BatchError, DiscardProgress, FfprobeConfig, FfprobeProvider, ItemProber,
    ProbeOrchestrator, ProbeOutcome, ProbeProvider, ProbeResult, ProbeSettings, ProgressSink,
    ProviderError,
};
pub use task::{
    next_daily_run, ProbeTask, RunnerError, RunnerStatus, ScheduleConfig, TaskError, TaskReport,
    TaskRunner, TriggerSource,
};
