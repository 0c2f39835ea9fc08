//! Scheduler configuration loaded from RON, TOML or JSON files.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, SchedulerData, load_scheduler_data};
