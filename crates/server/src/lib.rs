pub mod api;
pub mod metrics;
pub mod scheduler;
pub mod state;
