//! In-process task service
//!
//! Behaves like the remote server (assigns ids and dates, rejects unknown
//! ids) but keeps everything in memory. Failures can be injected per
//! operation or per task, and calls can be held open until released,
//! which makes the store's pending states observable in tests.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use super::{Endpoint, ServiceOp, TaskService};
use crate::error::{ServiceError, ServiceResult};
use crate::models::Task;

/// Task service backed by an in-memory list
#[derive(Debug, Default)]
pub struct InMemoryTaskService {
    tasks: Mutex<Vec<Task>>,
    /// Injected failures: (operation, task id or any) -> reason
    failures: Mutex<HashMap<(ServiceOp, Option<String>), String>>,
    /// Calls that wait for a release before running
    holds: Mutex<HashMap<ServiceOp, Arc<Semaphore>>>,
    /// Every call received, formatted as "METHOD /path"
    calls: Mutex<Vec<String>>,
}

impl InMemoryTaskService {
    /// Create an empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task directly, bypassing call recording and failures
    pub async fn insert(&self, text: &str, completed: bool) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            completed,
            created_date: now,
            completed_date: completed.then_some(now),
        };
        self.tasks.lock().await.push(task.clone());
        task
    }

    /// Current server-side tasks
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    /// Make every call of `op` fail with `reason`
    pub async fn fail(&self, op: ServiceOp, reason: &str) {
        self.failures
            .lock()
            .await
            .insert((op, None), reason.to_string());
    }

    /// Make calls of `op` that target `id` fail with `reason`
    pub async fn fail_for(&self, op: ServiceOp, id: &str, reason: &str) {
        self.failures
            .lock()
            .await
            .insert((op, Some(id.to_string())), reason.to_string());
    }

    /// Remove all injected failures
    pub async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    /// Hold calls of `op` until permits are added to the returned handle
    ///
    /// Each permit releases exactly one call. Permits added before a call
    /// arrives are kept for it.
    pub async fn hold(&self, op: ServiceOp) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.holds.lock().await.insert(op, Arc::clone(&gate));
        gate
    }

    /// Calls received so far
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// Number of calls received so far
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Record the call, wait for any hold, then apply injected failures
    async fn enter(&self, endpoint: Endpoint<'_>) -> ServiceResult<()> {
        self.calls.lock().await.push(endpoint.to_string());

        let hold = self.holds.lock().await.get(&endpoint.op()).cloned();
        if let Some(gate) = hold {
            // Only fails if the semaphore was closed, which nothing does
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let failures = self.failures.lock().await;
        let reason = endpoint
            .task_id()
            .and_then(|id| failures.get(&(endpoint.op(), Some(id.to_string()))))
            .or_else(|| failures.get(&(endpoint.op(), None)));

        match reason {
            Some(reason) => Err(ServiceError::Rejected {
                endpoint: endpoint.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn set_completed(&self, endpoint: Endpoint<'_>, completed: bool) -> ServiceResult<Task> {
        self.enter(endpoint).await?;
        let id = endpoint.task_id().unwrap_or_default();
        let mut tasks = self.tasks.lock().await;
        let task = find_mut(&mut tasks, &endpoint, id)?;
        task.completed = completed;
        task.completed_date = completed.then(Utc::now);
        Ok(task.clone())
    }
}

fn not_found(endpoint: &Endpoint<'_>) -> ServiceError {
    ServiceError::Status {
        endpoint: endpoint.to_string(),
        status: 404,
        reason: Some("Task not found".to_string()),
    }
}

fn find_mut<'t>(
    tasks: &'t mut [Task],
    endpoint: &Endpoint<'_>,
    id: &str,
) -> ServiceResult<&'t mut Task> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| not_found(endpoint))
}

impl TaskService for InMemoryTaskService {
    async fn list_all(&self) -> ServiceResult<Vec<Task>> {
        self.enter(Endpoint::ListAll).await?;
        Ok(self.tasks.lock().await.clone())
    }

    async fn list_completed(&self) -> ServiceResult<Vec<Task>> {
        self.enter(Endpoint::ListCompleted).await?;
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.completed)
            .cloned()
            .collect())
    }

    async fn create(&self, text: &str) -> ServiceResult<Task> {
        self.enter(Endpoint::Create).await?;
        let task = Task {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            completed: false,
            created_date: Utc::now(),
            completed_date: None,
        };
        self.tasks.lock().await.push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: &str, text: &str) -> ServiceResult<Task> {
        let endpoint = Endpoint::Update(id);
        self.enter(endpoint).await?;
        let mut tasks = self.tasks.lock().await;
        let task = find_mut(&mut tasks, &endpoint, id)?;
        task.text = text.to_string();
        Ok(task.clone())
    }

    async fn delete(&self, id: &str) -> ServiceResult<String> {
        let endpoint = Endpoint::Delete(id);
        self.enter(endpoint).await?;
        let mut tasks = self.tasks.lock().await;
        let pos = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| not_found(&endpoint))?;
        tasks.remove(pos);
        Ok(id.to_string())
    }

    async fn complete(&self, id: &str) -> ServiceResult<Task> {
        self.set_completed(Endpoint::Complete(id), true).await
    }

    async fn incomplete(&self, id: &str) -> ServiceResult<Task> {
        self.set_completed(Endpoint::Incomplete(id), false).await
    }
}
