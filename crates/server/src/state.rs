use std::sync::Arc;
use strmprobe_core::{CatchUpQueue, Config, FsLibraryStore, TaskRunner};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<FsLibraryStore>,
    runner: Arc<TaskRunner>,
    catch_up: Arc<CatchUpQueue>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<FsLibraryStore>,
        runner: Arc<TaskRunner>,
        catch_up: Arc<CatchUpQueue>,
    ) -> Self {
        Self {
            config,
            store,
            runner,
            catch_up,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<FsLibraryStore> {
        &self.store
    }

    pub fn runner(&self) -> &TaskRunner {
        self.runner.as_ref()
    }

    pub fn catch_up(&self) -> &CatchUpQueue {
        self.catch_up.as_ref()
    }
}
