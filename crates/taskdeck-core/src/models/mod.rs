pub mod error;
pub mod project;
pub mod task;

pub use error::{CoreError, CoreErrorKind};
pub use project::{DEFAULT_PROVIDER_TIMEOUT, GlobalConfig, ProjectConfig};
pub use task::{ProviderGroup, ProviderResult, StatusCategory, Task, TaskGroup};
