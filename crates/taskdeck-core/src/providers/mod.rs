pub mod process;
pub mod resolve;
pub mod wire;

pub use process::ProcessProviderExecutor;
pub use resolve::resolve_provider;
pub use wire::{WIRE_VERSION, parse_provider_output};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::execution::TokioProcessExecutor;
use crate::models::{CoreError, GlobalConfig, ProjectConfig, ProviderResult};

pub type ProviderOutcome = Result<ProviderResult, CoreError>;

pub type ProviderFuture = Pin<Box<dyn Future<Output = ProviderOutcome> + Send>>;

/// Runs one project's task provider to completion.
///
/// Implementations must attribute every error to `config.project_dir` and must not
/// retry. The returned future owns everything it needs so it can be spawned.
pub trait ProviderExecutor: Send + Sync {
    fn execute_provider(
        &self,
        config: &ProjectConfig,
        global: &GlobalConfig,
        timeout: Duration,
    ) -> ProviderFuture;
}

/// Runs a provider with the real process executor.
pub async fn execute_provider(
    config: &ProjectConfig,
    global: &GlobalConfig,
    timeout: Duration,
) -> ProviderOutcome {
    ProcessProviderExecutor::new(Arc::new(TokioProcessExecutor))
        .execute_provider(config, global, timeout)
        .await
}
