//! Orchestrator context
//!
//! [`WorkflowOrchestrator`] owns the runner, the classifier and the state
//! machine. It is constructed once and cloned into whatever UI adapters need
//! it; there is no global "current workflow".

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use hermes_sdk::{OutputStream, RunnerCommand, RunnerEvent, TaskRunner, WorkflowRun, WorkflowStatus};

use crate::classifier::OutputClassifier;
use crate::config::OrchestratorConfig;
use crate::discovery::{discover_interpreter, validate_agent_script};
use crate::error::{OrchestratorError, Result};
use crate::notifier::StatusBoard;
use crate::state::WorkflowStateMachine;

/// Flag that keeps the agent from asking for interactive confirmation
pub const AUTO_APPROVE_FLAG: &str = "--yes";

/// Lines of output kept for late subscribers
const OUTPUT_BUFFER_LINES: usize = 500;

/// A line of agent output tagged with its run
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLine {
    pub run_id: Uuid,
    pub stream: OutputStream,
    pub line: String,
}

/// How to launch the agent for a task description
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub interpreter: PathBuf,
    pub agent_script: PathBuf,
    pub env: HashMap<String, String>,
    pub current_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(interpreter: impl Into<PathBuf>, agent_script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            agent_script: agent_script.into(),
            env: HashMap::new(),
            current_dir: None,
        }
    }

    /// Resolve the interpreter and agent script from configuration.
    ///
    /// Fails with an environment error when either cannot be found.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let interpreter = discover_interpreter(config.interpreter.as_deref())?;
        let agent_script = validate_agent_script(&config.agent_script_path())?;

        let mut launch = Self::new(interpreter, agent_script);
        if let Some((key, value)) = config.credential_env() {
            launch.env.insert(key, value);
        }
        launch.current_dir = Some(config.project_root.clone());
        Ok(launch)
    }

    /// `[script, description, --yes]` on top of the interpreter
    pub fn command_for(&self, description: &str) -> RunnerCommand {
        let mut cmd = RunnerCommand::new(&self.interpreter)
            .arg(self.agent_script.to_string_lossy())
            .arg(description)
            .arg(AUTO_APPROVE_FLAG);
        cmd.env = self.env.clone();
        cmd.current_dir = self.current_dir.clone();
        cmd
    }
}

struct Inner {
    runner: Arc<dyn TaskRunner>,
    classifier: OutputClassifier,
    machine: WorkflowStateMachine,
    launch: LaunchSpec,
    output_tx: broadcast::Sender<OutputLine>,
    output_buffer: Mutex<VecDeque<OutputLine>>,
}

#[derive(Clone)]
pub struct WorkflowOrchestrator {
    inner: Arc<Inner>,
}

impl WorkflowOrchestrator {
    pub fn new(runner: Arc<dyn TaskRunner>, launch: LaunchSpec, classifier: OutputClassifier) -> Self {
        let (output_tx, _) = broadcast::channel(1000);
        Self {
            inner: Arc::new(Inner {
                runner,
                classifier,
                machine: WorkflowStateMachine::new(StatusBoard::new()),
                launch,
                output_tx,
                output_buffer: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Build from configuration, discovering the interpreter
    pub fn from_config(config: &OrchestratorConfig, runner: Arc<dyn TaskRunner>) -> Result<Self> {
        let launch = LaunchSpec::from_config(config)?;
        let classifier = config.classifier()?;
        Ok(Self::new(runner, launch, classifier))
    }

    /// The observable snapshot every UI surface reads from
    pub fn board(&self) -> &StatusBoard {
        self.inner.machine.board()
    }

    pub fn snapshot(&self) -> Option<WorkflowRun> {
        self.board().snapshot()
    }

    pub fn classifier(&self) -> &OutputClassifier {
        &self.inner.classifier
    }

    pub fn launch_spec(&self) -> &LaunchSpec {
        &self.inner.launch
    }

    /// Start a workflow for `description`.
    ///
    /// Validation and single-flight rejections leave everything untouched.
    /// If the process cannot be spawned the new run is recorded as failed
    /// and a spawn error is returned. Otherwise returns the running snapshot
    /// while output is processed in the background.
    pub async fn start_workflow(&self, description: &str) -> Result<WorkflowRun> {
        let machine = &self.inner.machine;
        let run = machine.request_start(description)?;
        self.clear_output();

        let command = self.inner.launch.command_for(&run.description);
        info!(run_id = %run.id, command = %command.display(), "starting workflow");

        let handle = match self.inner.runner.start(command).await {
            Ok(handle) => handle,
            Err(e) => {
                let message = e.to_string();
                machine.on_spawn_failure(run.id, &message);
                return Err(OrchestratorError::Spawn(message));
            }
        };

        info!(run_id = %run.id, pid = ?handle.pid, "workflow running");
        machine.mark_running(run.id);
        tokio::spawn(pump_events(self.inner.clone(), run.id, handle.events));

        Ok(self.snapshot().unwrap_or(run))
    }

    /// Real-time output of the current run
    pub fn subscribe_output(&self) -> broadcast::Receiver<OutputLine> {
        self.inner.output_tx.subscribe()
    }

    /// Buffered output of the current run, oldest first
    pub fn recent_output(&self, limit: Option<usize>) -> Vec<OutputLine> {
        let buffer = lock(&self.inner.output_buffer);
        let skip = limit.map_or(0, |limit| buffer.len().saturating_sub(limit));
        buffer.iter().skip(skip).cloned().collect()
    }

    /// Wait until the current run is terminal. Returns `None` when no run
    /// exists.
    pub async fn wait_for_completion(&self) -> Option<WorkflowRun> {
        let mut rx = self.board().watch();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                match snapshot.as_ref() {
                    None => return None,
                    Some(run) if run.is_terminal() => return Some(run.clone()),
                    Some(_) => {}
                }
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    fn clear_output(&self) {
        lock(&self.inner.output_buffer).clear();
    }
}

/// Turn a terminal run into the error it represents, if any
pub fn run_outcome(run: &WorkflowRun) -> Result<()> {
    match run.status {
        WorkflowStatus::Failed => Err(OrchestratorError::Execution(
            run.error.clone().unwrap_or_default(),
        )),
        _ => Ok(()),
    }
}

/// Feed runner events into the classifier and the state machine until the
/// process exits.
async fn pump_events(inner: Arc<Inner>, run_id: Uuid, mut events: mpsc::UnboundedReceiver<RunnerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RunnerEvent::Output { stream, line } => {
                if stream == OutputStream::Stdout {
                    if let Some(milestone) = inner.classifier.classify(&line) {
                        inner.machine.on_milestone(run_id, &milestone);
                    }
                }
                record_output(&inner, OutputLine { run_id, stream, line });
            }
            RunnerEvent::Exited { code, stderr } => {
                inner.machine.on_process_exit(run_id, code, &stderr);
                return;
            }
        }
    }

    warn!(%run_id, "task runner closed its event stream without an exit status");
    inner
        .machine
        .on_process_exit(run_id, None, "Task runner ended without reporting an exit status");
}

fn record_output(inner: &Inner, line: OutputLine) {
    // No subscribers is fine
    let _ = inner.output_tx.send(line.clone());

    let mut buffer = lock(&inner.output_buffer);
    if buffer.len() == OUTPUT_BUFFER_LINES {
        buffer.pop_front();
    }
    buffer.push_back(line);
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
