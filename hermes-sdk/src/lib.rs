//! Shared types for the Hermes workflow orchestrator.
//!
//! This crate holds the data exchanged between the orchestrator and whatever
//! actually runs the external agent process: run status, milestones, the
//! output event stream, and the [`TaskRunner`] capability itself.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// Workflow status for UI tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// Completed and failed runs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognized progress point in the agent's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub label: String,
    pub percentage: u8,
}

impl Milestone {
    pub fn new(label: impl Into<String>, percentage: u8) -> Self {
        Self {
            label: label.into(),
            percentage: percentage.min(100),
        }
    }
}

/// A milestone as it was reached during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    pub label: String,
    pub percentage: u8,
    pub reached_at: DateTime<Local>,
}

/// One execution session of the external task runner.
///
/// Instances handed out by the orchestrator are snapshots; mutating a clone
/// has no effect on the live run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub description: String,
    pub status: WorkflowStatus,
    /// Label of the most recently classified milestone
    pub current_step: Option<String>,
    /// 0-100
    pub progress: u8,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    /// Milestones in the order they fired
    pub milestones: Vec<MilestoneRecord>,
}

impl WorkflowRun {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_running(&self) -> bool {
        self.status == WorkflowStatus::Running
    }

    pub fn has_reached(&self, label: &str) -> bool {
        self.milestones.iter().any(|m| m.label == label)
    }

    /// Wall-clock duration so far, or total duration once finished
    pub fn elapsed(&self) -> chrono::Duration {
        let end = self.end_time.unwrap_or_else(Local::now);
        end.signed_duration_since(self.start_time)
    }
}

/// Which pipe a line of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Events delivered by a [`TaskRunner`] for one spawned process.
///
/// All `Output` events precede the single `Exited` event; nothing is sent
/// after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerEvent {
    /// One line of output, without its trailing newline
    Output { stream: OutputStream, line: String },
    /// Process exited. `code` is `None` when it was killed by a signal.
    Exited { code: Option<i32>, stderr: String },
}

impl RunnerEvent {
    pub fn stdout(line: impl Into<String>) -> Self {
        RunnerEvent::Output {
            stream: OutputStream::Stdout,
            line: line.into(),
        }
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        RunnerEvent::Output {
            stream: OutputStream::Stderr,
            line: line.into(),
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, RunnerEvent::Exited { .. })
    }
}

/// Everything needed to launch the external program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunnerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Overlaid on top of the inherited environment
    pub env: HashMap<String, String>,
    pub current_dir: Option<PathBuf>,
}

impl RunnerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Human-readable command line. Environment values are left out since
    /// they may carry credentials.
    pub fn display(&self) -> String {
        let mut cmd = format!("{}", self.program.display());
        for arg in &self.args {
            if arg.contains(' ') {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push_str(&format!(" {}", arg));
            }
        }
        cmd
    }
}

/// Handle to a spawned process
#[derive(Debug)]
pub struct RunnerHandle {
    pub pid: Option<u32>,
    pub events: mpsc::UnboundedReceiver<RunnerEvent>,
}

impl RunnerHandle {
    pub fn new(pid: Option<u32>, events: mpsc::UnboundedReceiver<RunnerEvent>) -> Self {
        Self { pid, events }
    }
}

/// Result type for runner operations
pub type WorkflowResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Capability to launch the external task runner.
///
/// `start` fails synchronously when the process cannot be created. Once it
/// returns a handle, the handle's channel yields output events followed by
/// exactly one [`RunnerEvent::Exited`].
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn start(&self, command: RunnerCommand) -> WorkflowResult<RunnerHandle>;
}
