//! Catch-up mode: probe newly added `.strm` items shortly after a scan.
//!
//! Notifications are collected until the library has been quiet for the
//! debounce delay, then handed to the orchestrator as one batch.

mod queue;

pub use queue::{CatchUpError, CatchUpQueue, CatchUpState, CatchUpStatus, CATCH_UP_DEBOUNCE};
