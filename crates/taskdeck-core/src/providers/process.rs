use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::execution::{
    CommandSpec, ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest,
    spawn_validated,
};
use crate::models::{CoreError, CoreErrorKind, GlobalConfig, ProjectConfig};
use crate::providers::{
    ProviderExecutor, ProviderFuture, ProviderOutcome, parse_provider_output, resolve_provider,
};

pub const PROJECT_DIR_ENV: &str = "TASKDECK_PROJECT_DIR";

const MAX_STDERR_CHARS: usize = 2000;

pub struct ProcessProviderExecutor {
    executor: Arc<dyn ProcessExecutor>,
}

impl ProcessProviderExecutor {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self { executor }
    }
}

impl ProviderExecutor for ProcessProviderExecutor {
    fn execute_provider(
        &self,
        config: &ProjectConfig,
        global: &GlobalConfig,
        timeout: Duration,
    ) -> ProviderFuture {
        let executor = self.executor.clone();
        let config = config.clone();
        let global = global.clone();

        Box::pin(async move {
            let outcome = run_provider(executor.as_ref(), &config, &global, timeout).await;
            match outcome {
                Ok(result) => {
                    tracing::debug!(
                        project_dir = %config.project_dir.display(),
                        tasks = result.task_count(),
                        "provider succeeded"
                    );
                    Ok(result)
                }
                Err(error) => {
                    let error = error.attribute(&config.project_dir);
                    tracing::warn!(
                        project_dir = %config.project_dir.display(),
                        kind = ?error.kind,
                        message = %error.message,
                        "provider failed"
                    );
                    Err(error)
                }
            }
        })
    }
}

async fn run_provider(
    executor: &dyn ProcessExecutor,
    config: &ProjectConfig,
    global: &GlobalConfig,
    timeout: Duration,
) -> ProviderOutcome {
    config.validate()?;
    let program = resolve_provider(config, global)?;
    let request = provider_request(config, global, program, timeout);
    let stdout = run_and_collect_stdout(executor, request).await?;
    parse_provider_output(&stdout)
}

pub fn provider_request(
    config: &ProjectConfig,
    global: &GlobalConfig,
    program: PathBuf,
    timeout: Duration,
) -> ProcessSpawnRequest {
    let mut command = CommandSpec::new(program)
        .args(config.args.iter().cloned())
        .working_dir(&config.project_dir);

    for (key, value) in &global.env {
        command = command.env(key, value);
    }
    command = command.env(
        PROJECT_DIR_ENV,
        config.project_dir.to_string_lossy().to_string(),
    );

    ProcessSpawnRequest::new(command)
        .project(&config.project_dir)
        .timeout(timeout)
}

async fn run_and_collect_stdout(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> Result<String, CoreError> {
    let project = request.project.clone();

    let process = spawn_validated(executor, request)?;
    let output: ProcessOutput = process.wait().await?;

    if output.stdout_truncated {
        return Err(CoreError {
            project,
            kind: CoreErrorKind::ResultParseError,
            message: format!(
                "provider output exceeded {} bytes",
                output.stdout.len()
            ),
        });
    }

    match output.status {
        ProcessExitStatus::ExitCode(0) => String::from_utf8(output.stdout).map_err(|error| CoreError {
            project,
            kind: CoreErrorKind::ResultParseError,
            message: format!("provider stdout is not valid UTF-8: {error}"),
        }),
        ProcessExitStatus::ExitCode(code) => Err(CoreError {
            project,
            kind: CoreErrorKind::ProviderExecutionFailed,
            message: format!(
                "provider exited with code {code}: {}",
                stderr_summary(&output.stderr)
            ),
        }),
        ProcessExitStatus::Terminated => Err(CoreError {
            project,
            kind: CoreErrorKind::ProviderExecutionFailed,
            message: format!(
                "provider was terminated by signal: {}",
                stderr_summary(&output.stderr)
            ),
        }),
    }
}

fn stderr_summary(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<no stderr>".to_string();
    }
    if trimmed.chars().count() <= MAX_STDERR_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_STDERR_CHARS).collect();
    truncated.push_str("...");
    truncated
}
