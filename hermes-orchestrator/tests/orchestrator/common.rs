//! Common test utilities for orchestrator tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use hermes_orchestrator::classifier::OutputClassifier;
use hermes_orchestrator::{LaunchSpec, WorkflowOrchestrator};
use hermes_sdk::{
    async_trait, RunnerCommand, RunnerEvent, RunnerHandle, TaskRunner, WorkflowResult, WorkflowRun,
};

pub const CALCULATOR_TASK: &str = "Create a simple calculator function";

enum Script {
    /// Emit these events right away, then close the stream
    Events(Vec<RunnerEvent>),
    /// Keep the stream open; the test drives it through `send`
    Manual,
    /// Refuse to start
    SpawnError(String),
}

/// Task runner that replays scripted events instead of spawning a process
pub struct FakeRunner {
    script: Script,
    starts: AtomicUsize,
    commands: Mutex<Vec<RunnerCommand>>,
    sender: Mutex<Option<mpsc::UnboundedSender<RunnerEvent>>>,
}

impl FakeRunner {
    fn with_script(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            starts: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            sender: Mutex::new(None),
        })
    }

    pub fn scripted(events: Vec<RunnerEvent>) -> Arc<Self> {
        Self::with_script(Script::Events(events))
    }

    pub fn manual() -> Arc<Self> {
        Self::with_script(Script::Manual)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::with_script(Script::SpawnError(message.to_string()))
    }

    /// Number of processes "spawned" so far
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn last_command(&self) -> Option<RunnerCommand> {
        self.commands.lock().unwrap().last().cloned()
    }

    /// Push an event into the most recent manual run
    pub fn send(&self, event: RunnerEvent) {
        let sender = self.sender.lock().unwrap();
        sender
            .as_ref()
            .expect("no manual run started")
            .send(event)
            .expect("orchestrator stopped listening");
    }
}

#[async_trait]
impl TaskRunner for FakeRunner {
    async fn start(&self, command: RunnerCommand) -> WorkflowResult<RunnerHandle> {
        self.commands.lock().unwrap().push(command);

        let (tx, rx) = mpsc::unbounded_channel();
        match &self.script {
            Script::SpawnError(message) => return Err(message.clone().into()),
            Script::Events(events) => {
                for event in events {
                    tx.send(event.clone()).unwrap();
                }
            }
            Script::Manual => {
                *self.sender.lock().unwrap() = Some(tx);
            }
        }

        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(RunnerHandle::new(Some(4242), rx))
    }
}

pub fn orchestrator_with(runner: Arc<FakeRunner>) -> WorkflowOrchestrator {
    let launch = LaunchSpec::new("/usr/bin/python3", "hermes-core/zswe_agent/main.py");
    WorkflowOrchestrator::new(runner, launch, OutputClassifier::default())
}

/// Wait until the snapshot satisfies `predicate`
pub async fn wait_for<F>(orchestrator: &WorkflowOrchestrator, predicate: F) -> WorkflowRun
where
    F: Fn(&WorkflowRun) -> bool,
{
    let mut rx = orchestrator.board().watch();
    let wait = async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(run) = snapshot {
                if predicate(&run) {
                    return run;
                }
            }
            rx.changed().await.expect("status board dropped");
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("condition not reached within 5s")
}

pub async fn wait_for_completion(orchestrator: &WorkflowOrchestrator) -> WorkflowRun {
    tokio::time::timeout(Duration::from_secs(10), orchestrator.wait_for_completion())
        .await
        .expect("workflow did not finish within 10s")
        .expect("no workflow run")
}

/// Create a unique temporary directory for testing
pub fn create_temp_dir(name: &str) -> PathBuf {
    let temp_dir = std::env::temp_dir().join(format!("hermes_test_{}_{}", name, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&temp_dir).unwrap();
    temp_dir
}

/// Clean up temporary directory
pub fn cleanup_temp_dir(path: &Path) {
    if path.exists() {
        std::fs::remove_dir_all(path).ok();
    }
}

/// Write a fake agent at `<root>/hermes-core/zswe_agent/main.py`. It is run
/// with `sh`, so the body is shell.
pub fn write_agent(root: &Path, body: &str) -> PathBuf {
    let dir = root.join("hermes-core").join("zswe_agent");
    std::fs::create_dir_all(&dir).unwrap();
    let script = dir.join("main.py");
    std::fs::write(&script, body).unwrap();
    script
}

pub fn exited(code: i32, stderr: &str) -> RunnerEvent {
    RunnerEvent::Exited {
        code: Some(code),
        stderr: stderr.to_string(),
    }
}
