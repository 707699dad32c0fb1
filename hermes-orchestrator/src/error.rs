//! Error taxonomy for the orchestrator.
//!
//! Validation, concurrency and environment errors are raised at the boundary
//! and never touch the state machine. Execution failures are absorbed into the
//! run's terminal state instead of being returned.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Task description must not be empty")]
    Validation,

    #[error("Workflow already in progress: {step} ({progress}%)")]
    Concurrency { step: String, progress: u8 },

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Failed to start the task runner: {0}")]
    Spawn(String),

    #[error("Workflow failed: {0}")]
    Execution(String),

    #[error("Constitution generation failed: {0}")]
    Constitution(String),

    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl OrchestratorError {
    /// Errors that should block the user with a modal message rather than a
    /// passing notification.
    pub fn is_blocking(&self) -> bool {
        !matches!(
            self,
            OrchestratorError::Execution(_) | OrchestratorError::Concurrency { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
