// Error taxonomy
pub mod error;

// Configuration layers
pub mod config;

// Interpreter and agent script discovery
pub mod discovery;

// Output classification into milestones
pub mod classifier;

// Observable snapshot shared by UI surfaces
pub mod notifier;

// Workflow state machine
pub mod state;

// Process-based task runner
pub mod runner;

// Orchestrator context tying everything together
pub mod orchestrator;

// Constitution fetcher
pub mod constitution;

// Terminal UI state and rendering
pub mod app;
pub mod ui;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{LaunchSpec, WorkflowOrchestrator};
