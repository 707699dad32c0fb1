use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use hermes_sdk::{
    async_trait, OutputStream, RunnerCommand, RunnerEvent, RunnerHandle, TaskRunner,
    WorkflowResult,
};

/// How long the output pipes may stay open after the child has exited
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Runs the task runner as a child process.
///
/// stdout and stderr are read on separate tasks while a third task waits for
/// the child. Once the child exits the readers get [`DEFAULT_DRAIN_GRACE`] to
/// reach end of file; every line read by then is delivered before the exit
/// event. A background process that inherited the pipes and keeps them open
/// past the grace period has its remaining output dropped.
///
/// Output is decoded lossily, so invalid UTF-8 becomes U+FFFD and never ends
/// a stream early.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    drain_grace: Duration,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    fn build_command(command: &RunnerCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRunner for ProcessRunner {
    async fn start(&self, command: RunnerCommand) -> WorkflowResult<RunnerHandle> {
        let mut child = Self::build_command(&command).spawn().map_err(|e| {
            error!(program = %command.program.display(), error = %e, "spawn failed");
            format!("Failed to spawn '{}': {}", command.program.display(), e)
        })?;

        let pid = child.id();
        info!(?pid, command = %command.display(), "task runner spawned");

        let stdout = child
            .stdout
            .take()
            .ok_or("No stdout available from child process")?;
        let stderr = child
            .stderr
            .take()
            .ok_or("No stderr available from child process")?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let stderr_lines = Arc::new(Mutex::new(Vec::new()));

        let mut stdout_task = tokio::spawn(forward_lines(
            stdout,
            OutputStream::Stdout,
            events_tx.clone(),
            None,
        ));
        let mut stderr_task = tokio::spawn(forward_lines(
            stderr,
            OutputStream::Stderr,
            events_tx.clone(),
            Some(stderr_lines.clone()),
        ));

        let drain_grace = self.drain_grace;
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    error!(?pid, error = %e, "failed to wait for task runner");
                    None
                }
            };
            debug!(?pid, ?code, "task runner exited");

            let drained = tokio::time::timeout(
                drain_grace,
                futures::future::join(&mut stdout_task, &mut stderr_task),
            )
            .await
            .is_ok();
            if !drained {
                warn!(?pid, "output pipes still open after exit, dropping the rest");
                stdout_task.abort();
                stderr_task.abort();
                // Aborted readers must be gone before the exit event goes out
                let _ = futures::future::join(stdout_task, stderr_task).await;
            }

            let stderr_text = stderr_lines
                .lock()
                .map(|lines| lines.join("\n"))
                .unwrap_or_default();

            let _ = events_tx.send(RunnerEvent::Exited {
                code,
                stderr: stderr_text,
            });
        });

        Ok(RunnerHandle::new(pid, events_rx))
    }
}

/// Forward each line of `reader` as an output event until end of file.
///
/// Lines are also appended to `capture` when given; for stderr that becomes
/// the failure diagnostic.
async fn forward_lines<R>(
    reader: R,
    stream: OutputStream,
    events_tx: mpsc::UnboundedSender<RunnerEvent>,
    capture: Option<Arc<Mutex<Vec<String>>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                if let Some(capture) = &capture {
                    if let Ok(mut lines) = capture.lock() {
                        lines.push(line.clone());
                    }
                }
                let _ = events_tx.send(RunnerEvent::Output { stream, line });
            }
            Err(e) => {
                debug!(stream = stream.as_str(), error = %e, "stopped reading output");
                break;
            }
        }
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
