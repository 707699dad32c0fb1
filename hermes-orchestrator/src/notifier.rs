//! Observable workflow snapshot shared by every UI surface.
//!
//! [`StatusBoard`] is the single state source. Mutations happen atomically
//! inside the board; readers only ever see whole snapshots. Two consumption
//! styles read the same value:
//!
//! - push: callbacks registered with [`StatusBoard::on_change`] run once per
//!   mutation, and [`StatusBoard::watch`] hands out async receivers
//! - poll: [`StatusBoard::poll_every`] reads the snapshot on a fixed cadence

use hermes_sdk::{WorkflowRun, WorkflowStatus};
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

type PushCallback = Box<dyn Fn(&WorkflowRun) + Send + Sync>;

/// Identifies a push subscription so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

struct BoardInner {
    tx: watch::Sender<Option<WorkflowRun>>,
    /// Also serializes mutations so callbacks observe them in order
    subscribers: Mutex<Vec<(SubscriptionId, PushCallback)>>,
    next_id: AtomicUsize,
}

#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<BoardInner>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(BoardInner {
                tx,
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Copy of the current run, if any
    pub fn snapshot(&self) -> Option<WorkflowRun> {
        self.inner.tx.borrow().clone()
    }

    /// Async receiver that wakes on every change
    pub fn watch(&self) -> watch::Receiver<Option<WorkflowRun>> {
        self.inner.tx.subscribe()
    }

    /// Register a push subscriber, invoked once per mutation with the new
    /// snapshot. Callbacks must not register or remove subscribers. A panic
    /// inside a callback is logged and does not reach the mutating caller.
    pub fn on_change(&self, callback: impl Fn(&WorkflowRun) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_subscribers().push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock_subscribers().retain(|(sub_id, _)| *sub_id != id);
    }

    /// Read the snapshot every `period` until `tick` breaks.
    ///
    /// The first tick fires immediately.
    pub fn poll_every<F>(&self, period: Duration, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut(Option<&WorkflowRun>) -> ControlFlow<()> + Send + 'static,
    {
        let rx = self.watch();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let snapshot = rx.borrow().clone();
                if tick(snapshot.as_ref()).is_break() {
                    break;
                }
            }
        })
    }

    /// Apply `f` to the slot. `f` returns whether it changed anything plus a
    /// value handed back to the caller; push subscribers run only on change.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut Option<WorkflowRun>) -> (bool, R)) -> R {
        let subscribers = self.lock_subscribers();

        let mut out = None;
        let changed = self.inner.tx.send_if_modified(|slot| {
            let (changed, value) = f(slot);
            out = Some(value);
            changed
        });

        if changed {
            let current = self.inner.tx.borrow().clone();
            if let Some(run) = current {
                for (id, callback) in subscribers.iter() {
                    // A panicking subscriber must not unwind into the event pump
                    if panic::catch_unwind(AssertUnwindSafe(|| callback(&run))).is_err() {
                        error!(subscription = id.0, run_id = %run.id, "push subscriber panicked");
                    }
                }
            }
        }

        match out {
            Some(value) => value,
            None => unreachable!("send_if_modified always runs its closure"),
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, PushCallback)>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// One report emitted by [`spawn_progress_report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub message: String,
    /// Percentage points gained since the previous report
    pub increment: u8,
    pub progress: u8,
}

/// Spawn a transient progress report.
///
/// It follows push updates for the current run and calls `report` whenever
/// the step label or progress changes. It finishes as soon as the run leaves
/// `running`, returning the status it ended on (`None` if the board was
/// dropped first).
pub fn spawn_progress_report<F>(board: &StatusBoard, mut report: F) -> JoinHandle<Option<WorkflowStatus>>
where
    F: FnMut(ProgressUpdate) + Send + 'static,
{
    let mut rx = board.watch();
    tokio::spawn(async move {
        let mut last_progress = 0u8;
        let mut last_step: Option<String> = None;

        loop {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(run) = snapshot {
                match run.status {
                    WorkflowStatus::Pending => {}
                    WorkflowStatus::Running => {
                        if run.progress > last_progress || run.current_step != last_step {
                            let message = run
                                .current_step
                                .clone()
                                .unwrap_or_else(|| "Starting...".to_string());
                            report(ProgressUpdate {
                                message,
                                increment: run.progress.saturating_sub(last_progress),
                                progress: run.progress,
                            });
                            last_progress = last_progress.max(run.progress);
                            last_step = run.current_step.clone();
                        }
                    }
                    status => return Some(status),
                }
            }

            if rx.changed().await.is_err() {
                return None;
            }
        }
    })
}
