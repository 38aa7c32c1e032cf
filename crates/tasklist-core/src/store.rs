//! Synchronization store
//!
//! The `SyncStore` holds the local snapshot of the remote task collection
//! and runs every mutation against a [`TaskService`]:
//!
//! - Deletions are applied to the snapshot immediately and restored if the
//!   service rejects them.
//! - Everything else waits for the service and reconciles the snapshot
//!   with the returned records.
//!
//! ## Operations
//!
//! Each operation walks a small state machine ([`Phase`]):
//!
//! ```text
//! Idle ──> OptimisticApplied ──> Committed
//!   │              └───────────> RolledBack
//!   ├────────────────────────────> Committed
//!   └────────────────────────────> Failed
//! ```
//!
//! Every transition is a single `send_modify` on a watch channel, so
//! subscribers never observe a half-applied change. Operations never return
//! errors: failures end up in [`Snapshot::error`] and the returned phase.
//!
//! ## Concurrency
//!
//! Operations take `&self` and are not serialized. When two overlap, the
//! snapshot update of whichever settles last wins for the tasks it touches.
//! `is_loading` stays true until the last in-flight operation settles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::BatchPolicy;
use crate::error::{ServiceError, StoreError};
use crate::models::{Task, TaskCounts, TaskFilter};
use crate::service::TaskService;

/// Identifies one store operation for the lifetime of the process
pub type OperationId = u64;

/// Tasks captured before an optimistic removal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "tasks", rename_all = "snake_case")]
pub enum RollbackFragment {
    /// A single deleted task
    Task(Task),
    /// Every task removed by a bulk delete
    Tasks(Vec<Task>),
}

impl RollbackFragment {
    pub fn tasks(&self) -> &[Task] {
        match self {
            RollbackFragment::Task(task) => std::slice::from_ref(task),
            RollbackFragment::Tasks(tasks) => tasks,
        }
    }

    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            RollbackFragment::Task(task) => vec![task],
            RollbackFragment::Tasks(tasks) => tasks,
        }
    }
}

/// The rollback fragment currently visible on the snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollbackBuffer {
    /// Operation that captured the fragment
    pub operation: OperationId,
    pub fragment: RollbackFragment,
}

/// Client-held view of the remote task collection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    tasks: Vec<Task>,
    is_loading: bool,
    error: Option<String>,
    rollback: Option<RollbackBuffer>,
    #[serde(skip)]
    in_flight: usize,
}

impl Snapshot {
    /// Tasks in display order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// True while any operation is unresolved
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Message from the most recent failed operation
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn rollback(&self) -> Option<&RollbackBuffer> {
        self.rollback.as_ref()
    }

    /// Look up a task by id
    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks passing `filter`, in display order
    pub fn filtered(&self, filter: TaskFilter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    pub fn counts(&self) -> TaskCounts {
        TaskCounts::from_tasks(&self.tasks)
    }

    /// Whether the view should show a blocking loading indicator
    ///
    /// Only while nothing has been loaded yet; once tasks are present the
    /// list stays visible during later operations.
    pub fn is_blocking(&self) -> bool {
        self.is_loading && self.tasks.is_empty()
    }
}

/// Where an operation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Started, nothing applied yet
    Idle,
    /// Local change applied, waiting for the service
    OptimisticApplied,
    /// Service confirmed, snapshot reconciled
    Committed,
    /// Service failed, optimistic change undone
    RolledBack,
    /// Service failed, nothing needed undoing
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Committed | Phase::RolledBack | Phase::Failed)
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Phase::Committed)
    }
}

/// The store operations, used for messages and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    LoadAll,
    Create,
    Update,
    Toggle,
    Delete,
    CompleteAll,
    DeleteCompleted,
}

impl OperationKind {
    /// Message shown when the operation fails without a service reason
    pub fn failure_message(&self) -> &'static str {
        match self {
            OperationKind::LoadAll => "Failed to load tasks",
            OperationKind::Create => "Failed to add task",
            OperationKind::Update => "Failed to update task",
            OperationKind::Toggle => "Failed to change task status",
            OperationKind::Delete => "Failed to delete task",
            OperationKind::CompleteAll => "Failed to complete all tasks",
            OperationKind::DeleteCompleted => "Failed to delete completed tasks",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::LoadAll => "load_all",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Toggle => "toggle",
            OperationKind::Delete => "delete",
            OperationKind::CompleteAll => "complete_all",
            OperationKind::DeleteCompleted => "delete_completed",
        };
        f.write_str(name)
    }
}

/// Store of tasks kept in sync with a remote [`TaskService`]
pub struct SyncStore<S> {
    service: S,
    snapshot: watch::Sender<Snapshot>,
    batch_policy: BatchPolicy,
    next_operation: AtomicU64,
}

impl<S: TaskService> SyncStore<S> {
    /// Create a store with an empty snapshot
    ///
    /// Nothing is fetched until [`load_all`](Self::load_all) is called.
    pub fn new(service: S) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            service,
            snapshot,
            batch_policy: BatchPolicy::default(),
            next_operation: AtomicU64::new(1),
        }
    }

    /// Set how bulk operations handle partial failures
    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    /// The underlying service
    pub fn service(&self) -> &S {
        &self.service
    }

    /// A copy of the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    fn begin(&self, kind: OperationKind) -> Operation<'_> {
        let id = self.next_operation.fetch_add(1, Ordering::Relaxed);
        Operation::begin(&self.snapshot, id, kind)
    }

    /// Replace the snapshot with every task from the service
    pub async fn load_all(&self) -> Phase {
        let op = self.begin(OperationKind::LoadAll);
        match self.service.list_all().await {
            Ok(tasks) => op.commit(|current| *current = tasks),
            Err(e) => op.fail(e.into()),
        }
    }

    /// Create a task and append it once the service confirms
    ///
    /// The caller is responsible for trimming and rejecting empty text.
    pub async fn create(&self, text: &str) -> Phase {
        let op = self.begin(OperationKind::Create);
        match self.service.create(text).await {
            Ok(task) => op.commit(|tasks| upsert_task(tasks, task)),
            Err(e) => op.fail(e.into()),
        }
    }

    /// Change the text of a task, keeping its position
    pub async fn update(&self, id: &str, text: &str) -> Phase {
        let op = self.begin(OperationKind::Update);
        match self.service.update(id, text).await {
            Ok(task) => op.commit(|tasks| replace_task(tasks, task)),
            Err(e) => op.fail(e.into()),
        }
    }

    /// Flip the completion state of a task
    ///
    /// Fails without contacting the service if the task is not in the
    /// snapshot.
    pub async fn toggle(&self, id: &str) -> Phase {
        let op = self.begin(OperationKind::Toggle);
        let completed = self.snapshot.borrow().find(id).map(|t| t.completed);

        let result = match completed {
            None => return op.fail(StoreError::TaskNotFound(id.to_string())),
            Some(true) => self.service.incomplete(id).await,
            Some(false) => self.service.complete(id).await,
        };

        match result {
            Ok(task) => op.commit(|tasks| replace_task(tasks, task)),
            Err(e) => op.fail(e.into()),
        }
    }

    /// Delete a task, removing it from the snapshot before the service
    /// confirms
    pub async fn delete(&self, id: &str) -> Phase {
        let mut op = self.begin(OperationKind::Delete);
        op.apply_optimistic(|tasks| {
            let pos = tasks.iter().position(|t| t.id == id)?;
            Some(RollbackFragment::Task(tasks.remove(pos)))
        });

        match self.service.delete(id).await {
            Ok(_) => op.commit(|_| {}),
            Err(e) => op.fail(e.into()),
        }
    }

    /// Mark every active task completed
    ///
    /// One request per task, run concurrently. The snapshot is only touched
    /// once all of them have settled.
    pub async fn complete_all(&self) -> Phase {
        let op = self.begin(OperationKind::CompleteAll);
        let active: Vec<String> = self
            .snapshot
            .borrow()
            .tasks
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.id.clone())
            .collect();

        let results = join_all(active.iter().map(|id| self.service.complete(id))).await;
        let total = results.len();

        let mut completed = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for (id, result) in active.iter().zip(results) {
            match result {
                Ok(task) => completed.push(task),
                Err(e) => {
                    warn!("complete_all: task {} failed: {}", id, e);
                    errors.push(e);
                }
            }
        }

        let Some(err) = batch_error(errors, total) else {
            return op.commit(|tasks| {
                for task in completed {
                    replace_task(tasks, task);
                }
            });
        };

        match self.batch_policy {
            BatchPolicy::AllOrNothing => op.fail(err),
            BatchPolicy::PerItem => op.fail_partially(
                err,
                |tasks| {
                    for task in completed {
                        replace_task(tasks, task);
                    }
                },
                Vec::new(),
            ),
        }
    }

    /// Delete every completed task, removing them from the snapshot before
    /// the service confirms
    pub async fn delete_completed(&self) -> Phase {
        let mut op = self.begin(OperationKind::DeleteCompleted);
        op.apply_optimistic(|tasks| {
            let (done, keep): (Vec<Task>, Vec<Task>) =
                std::mem::take(tasks).into_iter().partition(|t| t.completed);
            *tasks = keep;
            (!done.is_empty()).then_some(RollbackFragment::Tasks(done))
        });

        let captured = op.captured().to_vec();
        let results = join_all(captured.iter().map(|t| self.service.delete(&t.id))).await;
        let total = results.len();

        let mut restore = Vec::new();
        let mut errors = Vec::new();
        for (task, result) in captured.into_iter().zip(results) {
            if let Err(e) = result {
                warn!("delete_completed: task {} failed: {}", task.id, e);
                restore.push(task);
                errors.push(e);
            }
        }

        let Some(err) = batch_error(errors, total) else {
            return op.commit(|_| {});
        };

        match self.batch_policy {
            BatchPolicy::AllOrNothing => op.fail(err),
            BatchPolicy::PerItem => op.fail_partially(err, |_| {}, restore),
        }
    }
}

/// Fold the failures of a bulk operation into one error
fn batch_error(errors: Vec<ServiceError>, total: usize) -> Option<StoreError> {
    let failed = errors.len();
    let first = errors.into_iter().next()?;
    Some(StoreError::PartialBatch {
        failed,
        total,
        first,
    })
}

/// Replace the task with the same id in place; no-op when absent
fn replace_task(tasks: &mut [Task], task: Task) {
    if let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) {
        *slot = task;
    }
}

/// Replace the task with the same id, or append it
fn upsert_task(tasks: &mut Vec<Task>, task: Task) {
    match tasks.iter_mut().find(|t| t.id == task.id) {
        Some(slot) => *slot = task,
        None => tasks.push(task),
    }
}

/// Re-append restored tasks, skipping ids already present
fn restore_tasks(tasks: &mut Vec<Task>, restored: Vec<Task>) {
    for task in restored {
        if !tasks.iter().any(|t| t.id == task.id) {
            tasks.push(task);
        }
    }
}

/// One running store operation
///
/// Owns the rollback fragment it captured. Dropping an operation before it
/// reaches a terminal phase restores that fragment, so a cancelled future
/// never leaves tasks missing or the store stuck loading.
struct Operation<'a> {
    snapshot: &'a watch::Sender<Snapshot>,
    id: OperationId,
    kind: OperationKind,
    phase: Phase,
    fragment: Option<RollbackFragment>,
}

impl<'a> Operation<'a> {
    fn begin(snapshot: &'a watch::Sender<Snapshot>, id: OperationId, kind: OperationKind) -> Self {
        snapshot.send_modify(|s| {
            s.in_flight += 1;
            s.is_loading = true;
            s.error = None;
        });
        debug!("{} #{} started", kind, id);

        Self {
            snapshot,
            id,
            kind,
            phase: Phase::Idle,
            fragment: None,
        }
    }

    /// Apply a local change ahead of the service
    ///
    /// `remove` takes tasks out of the list and returns what it took. The
    /// fragment is kept for rollback and mirrored on the snapshot, replacing
    /// any fragment shown there.
    fn apply_optimistic<F>(&mut self, remove: F)
    where
        F: FnOnce(&mut Vec<Task>) -> Option<RollbackFragment>,
    {
        let id = self.id;
        let mut captured = None;
        self.snapshot.send_modify(|s| {
            captured = remove(&mut s.tasks);
            if let Some(fragment) = &captured {
                s.rollback = Some(RollbackBuffer {
                    operation: id,
                    fragment: fragment.clone(),
                });
            }
        });

        if captured.is_some() {
            self.phase = Phase::OptimisticApplied;
        }
        self.fragment = captured;
    }

    /// Tasks captured by the optimistic change
    fn captured(&self) -> &[Task] {
        self.fragment.as_ref().map(|f| f.tasks()).unwrap_or_default()
    }

    /// Reconcile the snapshot with the service's result
    fn commit<F>(mut self, reconcile: F) -> Phase
    where
        F: FnOnce(&mut Vec<Task>),
    {
        let id = self.id;
        self.snapshot.send_modify(|s| {
            reconcile(&mut s.tasks);
            settle(s, id);
        });

        self.fragment = None;
        self.phase = Phase::Committed;
        info!("{} #{} committed", self.kind, id);
        self.phase
    }

    /// Record the failure and undo the whole optimistic change
    fn fail(mut self, err: StoreError) -> Phase {
        let restore = self
            .fragment
            .take()
            .map(RollbackFragment::into_tasks)
            .unwrap_or_default();
        self.finish_failed(err, |_| {}, restore)
    }

    /// Record the failure, keep what succeeded and restore only `restore`
    fn fail_partially<F>(mut self, err: StoreError, reconcile: F, restore: Vec<Task>) -> Phase
    where
        F: FnOnce(&mut Vec<Task>),
    {
        self.fragment = None;
        self.finish_failed(err, reconcile, restore)
    }

    fn finish_failed<F>(&mut self, err: StoreError, reconcile: F, restore: Vec<Task>) -> Phase
    where
        F: FnOnce(&mut Vec<Task>),
    {
        let id = self.id;
        let message = err.user_message(self.kind.failure_message());
        let restored = restore.len();

        self.snapshot.send_modify(|s| {
            reconcile(&mut s.tasks);
            restore_tasks(&mut s.tasks, restore);
            s.error = Some(message);
            settle(s, id);
        });

        self.phase = if self.phase == Phase::OptimisticApplied {
            warn!(
                "{} #{} failed, restored {} task(s): {}",
                self.kind, id, restored, err
            );
            Phase::RolledBack
        } else {
            warn!("{} #{} failed: {}", self.kind, id, err);
            Phase::Failed
        };
        self.phase
    }
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        if self.phase.is_terminal() {
            return;
        }

        let id = self.id;
        let restore = self
            .fragment
            .take()
            .map(RollbackFragment::into_tasks)
            .unwrap_or_default();
        self.snapshot.send_modify(|s| {
            restore_tasks(&mut s.tasks, restore);
            settle(s, id);
        });
        warn!("{} #{} abandoned before the service answered", self.kind, id);
    }
}

/// Release an operation's hold on the snapshot
fn settle(snapshot: &mut Snapshot, id: OperationId) {
    if snapshot
        .rollback
        .as_ref()
        .is_some_and(|buffer| buffer.operation == id)
    {
        snapshot.rollback = None;
    }
    snapshot.in_flight = snapshot.in_flight.saturating_sub(1);
    snapshot.is_loading = snapshot.in_flight > 0;
}
