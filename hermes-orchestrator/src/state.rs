//! Workflow state machine
//!
//! `pending -> running -> {completed | failed}`, plus `pending -> failed`
//! when the process cannot be spawned. Terminal runs never change again.
//! All transitions go through the [`StatusBoard`], so UI surfaces always see
//! a consistent snapshot.

use chrono::Local;
use hermes_sdk::{Milestone, MilestoneRecord, WorkflowRun, WorkflowStatus};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::notifier::StatusBoard;

/// Diagnostic used when a failed process wrote nothing to stderr
pub fn empty_stderr_placeholder(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("Workflow exited with code {} and no error output", code),
        None => "Workflow was terminated by a signal and produced no error output".to_string(),
    }
}

#[derive(Clone)]
pub struct WorkflowStateMachine {
    board: StatusBoard,
}

impl WorkflowStateMachine {
    pub fn new(board: StatusBoard) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    /// Validate a start request and create a pending run.
    ///
    /// Rejects blank descriptions and refuses to replace a run that has not
    /// reached a terminal state. Neither rejection touches the board.
    pub fn request_start(&self, description: &str) -> Result<WorkflowRun> {
        let description = description.trim();
        if description.is_empty() {
            return Err(OrchestratorError::Validation);
        }

        self.board.mutate(|slot| {
            if let Some(existing) = slot.as_ref() {
                if !existing.is_terminal() {
                    let step = existing
                        .current_step
                        .clone()
                        .unwrap_or_else(|| existing.status.to_string());
                    return (
                        false,
                        Err(OrchestratorError::Concurrency {
                            step,
                            progress: existing.progress,
                        }),
                    );
                }
            }

            let run = WorkflowRun {
                id: Uuid::new_v4(),
                description: description.to_string(),
                status: WorkflowStatus::Pending,
                current_step: None,
                progress: 0,
                start_time: Local::now(),
                end_time: None,
                error: None,
                exit_code: None,
                milestones: Vec::new(),
            };
            debug!(run_id = %run.id, "created pending workflow run");
            *slot = Some(run.clone());
            (true, Ok(run))
        })
    }

    /// Pending -> running, once the process is up
    pub fn mark_running(&self, run_id: Uuid) -> bool {
        self.update_run(run_id, |run| {
            if run.status != WorkflowStatus::Pending {
                return false;
            }
            run.status = WorkflowStatus::Running;
            run.progress = 0;
            run.start_time = Local::now();
            info!(run_id = %run.id, "workflow running");
            true
        })
    }

    /// Apply a classified milestone.
    ///
    /// Each label fires once per run. Progress is clamped so it never goes
    /// backwards, even when markers arrive out of order. Ignored unless the
    /// run is running.
    pub fn on_milestone(&self, run_id: Uuid, milestone: &Milestone) -> bool {
        self.update_run(run_id, |run| {
            if run.status != WorkflowStatus::Running || run.has_reached(&milestone.label) {
                return false;
            }

            let progress = run.progress.max(milestone.percentage.min(100));
            if progress > milestone.percentage {
                debug!(
                    run_id = %run.id,
                    label = %milestone.label,
                    reported = milestone.percentage,
                    kept = progress,
                    "out-of-order milestone, progress clamped"
                );
            }

            run.current_step = Some(milestone.label.clone());
            run.progress = progress;
            run.milestones.push(MilestoneRecord {
                label: milestone.label.clone(),
                percentage: milestone.percentage,
                reached_at: Local::now(),
            });
            info!(run_id = %run.id, step = %milestone.label, progress, "workflow milestone");
            true
        })
    }

    /// Finalize the run from the process exit signal. Idempotent.
    pub fn on_process_exit(&self, run_id: Uuid, code: Option<i32>, stderr: &str) -> bool {
        self.update_run(run_id, |run| {
            if run.is_terminal() {
                debug!(run_id = %run.id, "duplicate exit signal ignored");
                return false;
            }

            run.exit_code = code;
            run.end_time = Some(Local::now());
            if code == Some(0) {
                run.status = WorkflowStatus::Completed;
                run.progress = 100;
                info!(run_id = %run.id, "workflow completed");
            } else {
                let stderr = stderr.trim_end();
                let error = if stderr.trim().is_empty() {
                    empty_stderr_placeholder(code)
                } else {
                    stderr.to_string()
                };
                run.status = WorkflowStatus::Failed;
                warn!(run_id = %run.id, ?code, "workflow failed");
                run.error = Some(error);
            }
            true
        })
    }

    /// Force a run whose process never started into `failed`
    pub fn on_spawn_failure(&self, run_id: Uuid, message: &str) -> bool {
        self.update_run(run_id, |run| {
            if run.is_terminal() {
                return false;
            }
            run.status = WorkflowStatus::Failed;
            run.end_time = Some(Local::now());
            run.error = Some(if message.trim().is_empty() {
                "Failed to start the task runner".to_string()
            } else {
                message.to_string()
            });
            warn!(run_id = %run.id, error = %message, "workflow failed to spawn");
            true
        })
    }

    fn update_run(&self, run_id: Uuid, f: impl FnOnce(&mut WorkflowRun) -> bool) -> bool {
        self.board.mutate(|slot| match slot.as_mut() {
            Some(run) if run.id == run_id => {
                let changed = f(run);
                (changed, changed)
            }
            _ => {
                debug!(%run_id, "event for a run that is no longer current");
                (false, false)
            }
        })
    }
}
