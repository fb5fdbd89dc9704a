pub mod cache;
pub mod dashboard;
pub mod execution;
pub mod models;
pub mod orchestration;
pub mod providers;

pub use cache::ResultCache;
pub use orchestration::{RefreshOptions, RefreshSnapshot, TaskOrchestrator};
