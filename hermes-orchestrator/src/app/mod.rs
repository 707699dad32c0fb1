//! Application state for the terminal UI
//!
//! The app never mutates workflow state itself. It holds the orchestrator
//! context and three passive surfaces fed from its status board:
//!
//! - the status indicator, updated by a push subscriber on every mutation
//! - the status tree, rebuilt by a poll task on a fixed cadence
//! - the progress overlay, driven by a transient progress report

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use hermes_sdk::WorkflowStatus;

use crate::constitution::ConstitutionFetcher;
use crate::error::OrchestratorError;
use crate::notifier::{spawn_progress_report, ProgressUpdate, SubscriptionId};
use crate::orchestrator::WorkflowOrchestrator;

mod commands;
mod navigation;
mod notifications;
mod status;

pub use commands::NotificationLevel;
pub use notifications::{Notification, NotificationManager};
pub use status::{build_status_tree, NodeState, StatusIndicator, TreeRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Status,
    Output,
    Constitution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstitutionState {
    Idle,
    Loading,
    Ready(String),
    Failed(String),
}

pub struct App {
    pub orchestrator: WorkflowOrchestrator,
    pub fetcher: ConstitutionFetcher,
    pub project_root: PathBuf,

    pub current_view: View,
    pub should_quit: bool,

    // Task description input
    pub is_editing: bool,
    pub input: String,

    /// Blocking error shown until dismissed
    pub modal_error: Option<String>,
    pub notifications: NotificationManager,

    // Passive surfaces
    pub indicator: Arc<Mutex<StatusIndicator>>,
    pub status_tree: Arc<Mutex<Vec<TreeRow>>>,
    pub progress: Arc<Mutex<Option<ProgressUpdate>>>,

    pub constitution: Arc<Mutex<ConstitutionState>>,
    pub scroll_offset: u16,

    subscription: SubscriptionId,
    poll_task: JoinHandle<()>,
    progress_task: Option<JoinHandle<Option<WorkflowStatus>>>,
    /// Last run whose outcome was already announced
    notified_run: Option<Uuid>,
}

impl App {
    /// Must be called from within a tokio runtime
    pub fn new(
        orchestrator: WorkflowOrchestrator,
        fetcher: ConstitutionFetcher,
        project_root: PathBuf,
        poll_interval: Duration,
    ) -> Self {
        let board = orchestrator.board().clone();

        let indicator = Arc::new(Mutex::new(
            board
                .snapshot()
                .map(|run| StatusIndicator::from_run(&run))
                .unwrap_or_default(),
        ));
        let indicator_sub = indicator.clone();
        let subscription = board.on_change(move |run| {
            if let Ok(mut indicator) = indicator_sub.lock() {
                *indicator = StatusIndicator::from_run(run);
            }
        });

        let status_tree = Arc::new(Mutex::new(Vec::new()));
        let tree_poll = status_tree.clone();
        let rules = orchestrator.classifier().rules().to_vec();
        let poll_task = board.poll_every(poll_interval, move |snapshot| {
            if let Ok(mut tree) = tree_poll.lock() {
                *tree = build_status_tree(snapshot, &rules);
            }
            std::ops::ControlFlow::Continue(())
        });

        Self {
            orchestrator,
            fetcher,
            project_root,
            current_view: View::Status,
            should_quit: false,
            is_editing: false,
            input: String::new(),
            modal_error: None,
            notifications: NotificationManager::new(),
            indicator,
            status_tree,
            progress: Arc::new(Mutex::new(None)),
            constitution: Arc::new(Mutex::new(ConstitutionState::Idle)),
            scroll_offset: 0,
            subscription,
            poll_task,
            progress_task: None,
            notified_run: None,
        }
    }

    /// Start a workflow for `description`, routing errors to the right surface
    pub async fn start_workflow(&mut self, description: &str) {
        match self.orchestrator.start_workflow(description).await {
            Ok(run) => {
                self.notifications
                    .info("Workflow started", run.description.clone());
                self.spawn_progress_report();
                self.current_view = View::Status;
            }
            Err(err @ OrchestratorError::Concurrency { .. }) => {
                self.notifications.warning("Workflow not started", err.to_string());
            }
            Err(err) => {
                if matches!(err, OrchestratorError::Spawn(_)) {
                    // The run is already failed; don't announce it twice
                    self.notified_run = self.orchestrator.snapshot().map(|run| run.id);
                }
                warn!(error = %err, "workflow start rejected");
                self.modal_error = Some(err.to_string());
            }
        }
    }

    /// Kick off a constitution fetch unless one is already in flight
    pub fn request_constitution(&mut self) {
        {
            let mut state = lock(&self.constitution);
            if *state == ConstitutionState::Loading {
                return;
            }
            *state = ConstitutionState::Loading;
        }
        self.scroll_offset = 0;

        let fetcher = self.fetcher.clone();
        let root = self.project_root.clone();
        let target = self.constitution.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&root).await;
            let mut state = lock(&target);
            *state = match result {
                Ok(text) => ConstitutionState::Ready(text),
                Err(err) => ConstitutionState::Failed(err.to_string()),
            };
        });
    }

    /// Periodic housekeeping between frames
    pub fn on_tick(&mut self) {
        self.notifications.cleanup_expired();

        if self
            .progress_task
            .as_ref()
            .is_some_and(|task| task.is_finished())
        {
            self.progress_task = None;
            *lock(&self.progress) = None;
        }

        if let Some(run) = self.orchestrator.snapshot() {
            if run.is_terminal() && self.notified_run != Some(run.id) {
                self.notified_run = Some(run.id);
                match run.status {
                    WorkflowStatus::Completed => {
                        self.notifications
                            .success("Workflow completed", run.description.clone());
                    }
                    _ => {
                        let error = run.error.clone().unwrap_or_default();
                        self.notifications.error("Workflow failed", error);
                    }
                }
            }
        }
    }

    /// Stop background tasks and drop the push subscription
    pub fn shutdown(&mut self) {
        debug!("shutting down ui surfaces");
        self.poll_task.abort();
        if let Some(task) = self.progress_task.take() {
            task.abort();
        }
        self.orchestrator.board().unsubscribe(self.subscription);
    }

    fn spawn_progress_report(&mut self) {
        if let Some(task) = self.progress_task.take() {
            task.abort();
        }
        let progress = self.progress.clone();
        *lock(&progress) = Some(ProgressUpdate {
            message: "Starting...".to_string(),
            increment: 0,
            progress: 0,
        });
        self.progress_task = Some(spawn_progress_report(
            self.orchestrator.board(),
            move |update| {
                *lock(&progress) = Some(update);
            },
        ));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
