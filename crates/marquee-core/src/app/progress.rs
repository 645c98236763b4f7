//! ProgressBridge - 長時間ジョブの進捗をコンテナと通知フィードへ中継する
//!
//! # 状態遷移
//! - Queued → InProgress(p) → Completed | Failed
//! - cancel() はどの状態からでも追跡をやめる（通知は出さない）
//!
//! 終端に達したジョブは追跡対象から外れ、以降の進捗は無視される。

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::dispatcher::Settled;
use crate::domain::{NotificationId, NotificationKind, NotificationPayload, OperationId};
use crate::store::ui::UiStore;

/// Consecutive failed status polls tolerated before a watcher gives up.
pub const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 3;

/// Receives progress for the container (and optionally the item) a job belongs to.
pub trait ProgressTarget: Send + Sync {
    fn report_progress(&self, item: Option<&str>, percent: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    InProgress(u8),
    Completed,
    Failed,
}

struct TrackedJob {
    title: String,
    item: Option<String>,
    state: JobState,
    target: Arc<dyn ProgressTarget>,
}

pub struct ProgressBridge {
    jobs: Mutex<HashMap<OperationId, TrackedJob>>,
    ui: Arc<UiStore>,
}

impl ProgressBridge {
    pub fn new(ui: Arc<UiStore>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            ui,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<OperationId, TrackedJob>> {
        self.jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Start tracking `id` in the Queued state.
    pub fn track(
        &self,
        id: OperationId,
        title: impl Into<String>,
        item: Option<String>,
        target: Arc<dyn ProgressTarget>,
    ) {
        let title = title.into();
        tracing::debug!(op = %id, %title, "tracking job");
        self.lock().insert(
            id,
            TrackedJob {
                title,
                item,
                state: JobState::Queued,
                target,
            },
        );
    }

    pub fn state(&self, id: &OperationId) -> Option<JobState> {
        self.lock().get(id).map(|job| job.state)
    }

    pub fn active(&self) -> Vec<(OperationId, JobState)> {
        self.lock()
            .iter()
            .map(|(id, job)| (id.clone(), job.state))
            .collect()
    }

    /// Returns false when `id` is not tracked (unknown, finished or cancelled).
    pub fn on_progress(&self, id: &OperationId, percent: u8) -> bool {
        let percent = percent.min(100);
        let (target, item) = {
            let mut jobs = self.lock();
            let Some(job) = jobs.get_mut(id) else {
                return false;
            };
            job.state = JobState::InProgress(percent);
            (Arc::clone(&job.target), job.item.clone())
        };
        target.report_progress(item.as_deref(), percent);
        true
    }

    pub fn complete(&self, id: &OperationId, message: impl Into<String>) -> Option<NotificationId> {
        self.complete_with_ref(id, message, None)
    }

    /// Like `complete`, but the notification points at `action_ref` instead of
    /// the tracked item (e.g. a confirmed server id replacing a local one).
    pub fn complete_with_ref(
        &self,
        id: &OperationId,
        message: impl Into<String>,
        action_ref: Option<String>,
    ) -> Option<NotificationId> {
        let mut job = self.lock().remove(id)?;
        job.target.report_progress(job.item.as_deref(), 100);
        tracing::info!(op = %id, title = %job.title, "job completed");
        if action_ref.is_some() {
            job.item = action_ref;
        }
        Some(self.finish(job, JobState::Completed, message.into()))
    }

    pub fn fail(&self, id: &OperationId, message: impl Into<String>) -> Option<NotificationId> {
        let job = self.lock().remove(id)?;
        let message = message.into();
        tracing::warn!(op = %id, title = %job.title, %message, "job failed");
        Some(self.finish(job, JobState::Failed, message))
    }

    /// Stop tracking without notifying.
    pub fn cancel(&self, id: &OperationId) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            tracing::debug!(op = %id, "job cancelled");
        }
        removed
    }

    fn finish(&self, job: TrackedJob, state: JobState, message: String) -> NotificationId {
        let kind = match state {
            JobState::Completed => NotificationKind::Success,
            _ => NotificationKind::Error,
        };
        self.ui.notify(NotificationPayload {
            kind,
            title: job.title,
            message,
            action_ref: job.item,
        })
    }
}

/// What a status poll says about a long-running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Running(u8),
    Completed(String),
    Failed(String),
}

/// Items whose server-side job can be polled to completion.
pub trait Pollable {
    fn poll_status(&self) -> PollStatus;
}

/// Handle to a background watcher.
///
/// `cancel()` でポーリングを止める。handle を drop した場合も watcher は止まる。
pub struct JobHandle {
    id: OperationId,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
    bridge: Arc<ProgressBridge>,
}

impl JobHandle {
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn cancel(&self) {
        self.bridge.cancel(&self.id);
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the watcher to stop.
    pub async fn join(self) {
        let JobHandle { id, cancel, task, .. } = self;
        if let Err(err) = task.await {
            tracing::error!(op = %id, error = %err, "watcher task failed");
        }
        drop(cancel);
    }
}

/// Poll `poll` every `interval` until the job settles or the handle is cancelled.
///
/// The job must already be tracked under `id`.
pub fn spawn_watcher<T, F, Fut>(
    bridge: Arc<ProgressBridge>,
    id: OperationId,
    interval: Duration,
    mut poll: F,
) -> JobHandle
where
    T: Pollable + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Settled<T>> + Send + 'static,
{
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    let task_bridge = Arc::clone(&bridge);
    let task_id = id.clone();

    let task = tokio::spawn(async move {
        let bridge = task_bridge;
        let id = task_id;
        let mut failures = 0u32;

        loop {
            if *cancel_rx.borrow() {
                break;
            }

            let settled = tokio::select! {
                _ = cancel_rx.changed() => break,
                settled = poll() => settled,
            };

            match settled {
                Settled::Fulfilled(job) => {
                    failures = 0;
                    match job.poll_status() {
                        PollStatus::Running(percent) => {
                            bridge.on_progress(&id, percent);
                        }
                        PollStatus::Completed(message) => {
                            bridge.complete(&id, message);
                            return;
                        }
                        PollStatus::Failed(message) => {
                            bridge.fail(&id, message);
                            return;
                        }
                    }
                }
                Settled::Rejected(err) => {
                    failures += 1;
                    if err.is_session() || failures >= MAX_CONSECUTIVE_POLL_FAILURES {
                        bridge.fail(&id, err.message);
                        return;
                    }
                }
                Settled::Superseded => {}
            }

            tokio::select! {
                _ = cancel_rx.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        // cancelled, or the handle was dropped
        bridge.cancel(&id);
    });

    JobHandle {
        id,
        cancel: cancel_tx,
        task,
        bridge,
    }
}
