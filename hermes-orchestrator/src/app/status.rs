//! View models derived from the workflow snapshot
//!
//! These are pure functions of a [`WorkflowRun`] so both the push-driven
//! indicator and the poll-driven tree render from exactly the same data.

use hermes_sdk::{WorkflowRun, WorkflowStatus};

use crate::classifier::MilestoneRule;

/// Text and tone of the one-line status indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusIndicator {
    pub text: String,
    pub status: Option<WorkflowStatus>,
}

impl StatusIndicator {
    pub fn idle() -> Self {
        Self {
            text: "Hermes: Idle".to_string(),
            status: None,
        }
    }

    pub fn from_run(run: &WorkflowRun) -> Self {
        let text = match run.status {
            WorkflowStatus::Pending => "Hermes: Starting...".to_string(),
            WorkflowStatus::Running => format!(
                "Hermes: {} ({}%)",
                run.current_step.as_deref().unwrap_or("Running"),
                run.progress
            ),
            WorkflowStatus::Completed => "Hermes: Completed".to_string(),
            WorkflowStatus::Failed => "Hermes: Failed".to_string(),
        };
        Self {
            text,
            status: Some(run.status),
        }
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::idle()
    }
}

/// State of one node in the status tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Info,
    Waiting,
    Active,
    Done,
    Failed,
}

/// One flattened row of the hierarchical status view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub label: String,
    pub detail: Option<String>,
    pub state: NodeState,
}

impl TreeRow {
    fn new(depth: usize, label: impl Into<String>, detail: Option<String>, state: NodeState) -> Self {
        Self {
            depth,
            label: label.into(),
            detail,
            state,
        }
    }
}

/// Build the hierarchical view: run summary, then every known milestone
/// with whether it was reached.
pub fn build_status_tree(run: Option<&WorkflowRun>, rules: &[MilestoneRule]) -> Vec<TreeRow> {
    let run = match run {
        Some(run) => run,
        None => {
            return vec![TreeRow::new(
                0,
                "No workflow has been started",
                None,
                NodeState::Info,
            )]
        }
    };

    let run_state = match run.status {
        WorkflowStatus::Pending => NodeState::Waiting,
        WorkflowStatus::Running => NodeState::Active,
        WorkflowStatus::Completed => NodeState::Done,
        WorkflowStatus::Failed => NodeState::Failed,
    };

    let mut rows = vec![
        TreeRow::new(0, truncate(&run.description, 60), Some(run.status.to_string()), run_state),
        TreeRow::new(
            1,
            "Current step",
            Some(run.current_step.clone().unwrap_or_else(|| "-".to_string())),
            NodeState::Info,
        ),
        TreeRow::new(1, "Progress", Some(format!("{}%", run.progress)), NodeState::Info),
        TreeRow::new(
            1,
            "Started",
            Some(run.start_time.format("%H:%M:%S").to_string()),
            NodeState::Info,
        ),
        TreeRow::new(1, "Duration", Some(format_duration(run.elapsed())), NodeState::Info),
    ];

    if let Some(error) = &run.error {
        // Tracebacks end with the actual exception
        let last_line = error.lines().last().unwrap_or_default();
        rows.push(TreeRow::new(1, "Error", Some(truncate(last_line, 80)), NodeState::Failed));
    }

    rows.push(TreeRow::new(1, "Milestones", None, NodeState::Info));
    for rule in rules {
        let reached = run.milestones.iter().find(|m| m.label == rule.label);
        let state = match reached {
            Some(_) if run.is_running() && run.current_step.as_deref() == Some(rule.label.as_str()) => {
                NodeState::Active
            }
            Some(_) => NodeState::Done,
            None => NodeState::Waiting,
        };
        let detail = match reached {
            Some(record) => format!("{}% at {}", rule.percentage, record.reached_at.format("%H:%M:%S")),
            None => format!("{}%", rule.percentage),
        };
        rows.push(TreeRow::new(2, rule.label.clone(), Some(detail), state));
    }

    // Milestones missing from the rule table
    for record in &run.milestones {
        if !rules.iter().any(|r| r.label == record.label) {
            rows.push(TreeRow::new(
                2,
                record.label.clone(),
                Some(format!("{}%", record.percentage)),
                NodeState::Done,
            ));
        }
    }

    rows
}

fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds().max(0);
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
