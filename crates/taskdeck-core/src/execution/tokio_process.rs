use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::execution::{
    ExecutionResult, ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest,
    ProcessWaitFuture, RunningProcess,
};
use crate::models::{CoreError, CoreErrorKind};

/// Grace period for pipes to reach EOF once the provider's process group is gone.
const PIPE_DRAIN_DEADLINE: Duration = Duration::from_millis(250);
const KILL_REAP_DEADLINE: Duration = Duration::from_secs(1);
const STDERR_LIMIT: usize = 64 * 1024;
const READ_CHUNK: usize = 8 * 1024;

/// Runs providers as real child processes, each leading its own process group.
///
/// When the leader exits (or times out) the rest of its group is killed, so a provider
/// that leaves background work behind cannot hold the output pipes open.
pub struct TokioProcessExecutor;

impl ProcessExecutor for TokioProcessExecutor {
    fn spawn(&self, request: ProcessSpawnRequest) -> ExecutionResult<Box<dyn RunningProcess>> {
        let spec = &request.command;
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|error| {
            let kind = match error.kind() {
                ErrorKind::NotFound => CoreErrorKind::ProviderNotFound,
                _ => CoreErrorKind::ProviderExecutionFailed,
            };
            CoreError {
                project: request.project.clone(),
                kind,
                message: format!("failed to spawn '{}': {error}", spec.program.display()),
            }
        })?;

        let pid = child.id();
        tracing::debug!(
            program = %spec.program.display(),
            pid = ?pid,
            project = ?request.project,
            "spawned provider process"
        );

        let stdout = PipeCapture::start(child.stdout.take(), request.stdout_limit);
        let stderr = PipeCapture::start(child.stderr.take(), STDERR_LIMIT);

        Ok(Box::new(ProviderProcess {
            child: Mutex::new(Some(child)),
            pid,
            started_at: SystemTime::now(),
            timeout: request.timeout,
            project: request.project,
            stdout,
            stderr,
        }))
    }
}

struct ProviderProcess {
    child: Mutex<Option<Child>>,
    pid: Option<u32>,
    started_at: SystemTime,
    timeout: Option<Duration>,
    project: Option<PathBuf>,
    stdout: PipeCapture,
    stderr: PipeCapture,
}

impl RunningProcess for ProviderProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn wait(self: Box<Self>) -> ProcessWaitFuture {
        let ProviderProcess {
            child,
            pid,
            started_at,
            timeout,
            project,
            stdout,
            stderr,
        } = *self;
        let child = child.into_inner().ok().flatten();

        Box::pin(async move {
            let Some(mut child) = child else {
                stdout.abort();
                stderr.abort();
                return Err(CoreError {
                    project,
                    kind: CoreErrorKind::ProviderExecutionFailed,
                    message: "provider process was already waited on".to_string(),
                });
            };

            let exited = match timeout {
                Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
                None => Some(child.wait().await),
            };

            let Some(exited) = exited else {
                kill_process_group(pid);
                let _ = child.start_kill();
                let _ = tokio::time::timeout(KILL_REAP_DEADLINE, child.wait()).await;
                stdout.abort();
                stderr.abort();
                let limit = timeout.unwrap_or_default();
                tracing::warn!(
                    pid = ?pid,
                    project = ?project,
                    timeout_ms = limit.as_millis() as u64,
                    "provider timed out; process group killed"
                );
                return Err(CoreError {
                    project,
                    kind: CoreErrorKind::ProviderTimeout,
                    message: format!("provider timed out after {}ms", limit.as_millis()),
                });
            };

            let status = match exited {
                Ok(status) => status,
                Err(error) => {
                    kill_process_group(pid);
                    stdout.abort();
                    stderr.abort();
                    return Err(CoreError {
                        project,
                        kind: CoreErrorKind::ProviderExecutionFailed,
                        message: format!("failed to wait for provider: {error}"),
                    });
                }
            };

            // Whatever is still in the group was started by the provider and would hold the pipes.
            if kill_process_group(pid) {
                tracing::debug!(
                    pid = ?pid,
                    project = ?project,
                    "killed processes left running by provider"
                );
            }

            let stdout = stdout.collect(PIPE_DRAIN_DEADLINE).await;
            let stderr = stderr.collect(PIPE_DRAIN_DEADLINE).await;

            Ok(ProcessOutput {
                status: match status.code() {
                    Some(code) => ProcessExitStatus::ExitCode(code),
                    None => ProcessExitStatus::Terminated,
                },
                stdout: stdout.bytes,
                stdout_truncated: stdout.truncated,
                stderr: stderr.bytes,
                started_at,
                finished_at: SystemTime::now(),
            })
        })
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Reads one pipe into a bounded buffer that stays readable if the reader is cut off.
struct PipeCapture {
    buffer: Arc<Mutex<Captured>>,
    reader: JoinHandle<()>,
}

impl PipeCapture {
    fn start<R>(pipe: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Captured::default()));
        let sink = buffer.clone();
        let reader = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                let read = match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(read) => read,
                };
                let mut captured = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                let room = limit.saturating_sub(captured.bytes.len());
                if read > room {
                    captured.bytes.extend_from_slice(&chunk[..room]);
                    captured.truncated = true;
                    return;
                }
                captured.bytes.extend_from_slice(&chunk[..read]);
            }
        });
        Self { buffer, reader }
    }

    /// Waits up to `deadline` for EOF, then returns whatever was read.
    async fn collect(mut self, deadline: Duration) -> Captured {
        if tokio::time::timeout(deadline, &mut self.reader).await.is_err() {
            self.reader.abort();
        }
        let mut captured = self
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *captured)
    }

    fn abort(self) {
        self.reader.abort();
    }
}

/// Sends SIGKILL to every process in the group led by `pid`. Returns whether any was signalled.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) -> bool {
    let Some(pid) = pid else {
        return false;
    };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    unsafe { libc::kill(-pgid, libc::SIGKILL) == 0 }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) -> bool {
    false
}
