//! Remote task service
//!
//! The store talks to the remote collection of tasks only through the
//! [`TaskService`] trait. Two implementations are provided:
//!
//! - [`HttpTaskService`]: JSON over HTTP against the task server
//! - [`InMemoryTaskService`]: an in-process stand-in with failure injection
//!
//! ## Endpoints
//!
//! | Operation      | Method | Path                     |
//! |----------------|--------|--------------------------|
//! | List all       | GET    | `/tasks`                 |
//! | List completed | GET    | `/tasks/completed`       |
//! | Create         | POST   | `/tasks`                 |
//! | Update         | POST   | `/tasks/{id}`            |
//! | Delete         | DELETE | `/tasks/{id}`            |
//! | Complete       | POST   | `/tasks/{id}/complete`   |
//! | Incomplete     | POST   | `/tasks/{id}/incomplete` |

mod http;
mod memory;

use std::fmt;
use std::future::Future;

pub use http::HttpTaskService;
pub use memory::InMemoryTaskService;

use crate::error::ServiceResult;
use crate::models::Task;

/// Contract of the remote task service
///
/// Every call may fail; implementations report failures as
/// [`ServiceError`](crate::error::ServiceError) and never panic on bad input
/// from the other side.
pub trait TaskService: Send + Sync {
    /// Fetch every task
    fn list_all(&self) -> impl Future<Output = ServiceResult<Vec<Task>>> + Send;

    /// Fetch only completed tasks
    fn list_completed(&self) -> impl Future<Output = ServiceResult<Vec<Task>>> + Send;

    /// Create a task with the given text
    fn create(&self, text: &str) -> impl Future<Output = ServiceResult<Task>> + Send;

    /// Replace the text of a task
    fn update(&self, id: &str, text: &str) -> impl Future<Output = ServiceResult<Task>> + Send;

    /// Delete a task, returning the deleted id
    fn delete(&self, id: &str) -> impl Future<Output = ServiceResult<String>> + Send;

    /// Mark a task completed
    fn complete(&self, id: &str) -> impl Future<Output = ServiceResult<Task>> + Send;

    /// Mark a task not completed
    fn incomplete(&self, id: &str) -> impl Future<Output = ServiceResult<Task>> + Send;
}

/// Kind of remote call, independent of its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    ListAll,
    ListCompleted,
    Create,
    Update,
    Delete,
    Complete,
    Incomplete,
}

/// A concrete remote call: operation plus the task it targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    ListAll,
    ListCompleted,
    Create,
    Update(&'a str),
    Delete(&'a str),
    Complete(&'a str),
    Incomplete(&'a str),
}

impl<'a> Endpoint<'a> {
    pub fn op(&self) -> ServiceOp {
        match self {
            Endpoint::ListAll => ServiceOp::ListAll,
            Endpoint::ListCompleted => ServiceOp::ListCompleted,
            Endpoint::Create => ServiceOp::Create,
            Endpoint::Update(_) => ServiceOp::Update,
            Endpoint::Delete(_) => ServiceOp::Delete,
            Endpoint::Complete(_) => ServiceOp::Complete,
            Endpoint::Incomplete(_) => ServiceOp::Incomplete,
        }
    }

    /// Task id targeted by this call, if any
    pub fn task_id(&self) -> Option<&'a str> {
        match *self {
            Endpoint::Update(id)
            | Endpoint::Delete(id)
            | Endpoint::Complete(id)
            | Endpoint::Incomplete(id) => Some(id),
            _ => None,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::ListAll | Endpoint::ListCompleted => "GET",
            Endpoint::Delete(_) => "DELETE",
            _ => "POST",
        }
    }

    /// Path segments below the service origin
    pub fn segments(&self) -> Vec<&'a str> {
        match *self {
            Endpoint::ListAll | Endpoint::Create => vec!["tasks"],
            Endpoint::ListCompleted => vec!["tasks", "completed"],
            Endpoint::Update(id) | Endpoint::Delete(id) => vec!["tasks", id],
            Endpoint::Complete(id) => vec!["tasks", id, "complete"],
            Endpoint::Incomplete(id) => vec!["tasks", id, "incomplete"],
        }
    }
}

impl fmt::Display for Endpoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method(), self.segments().join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::ListAll.to_string(), "GET /tasks");
        assert_eq!(Endpoint::ListCompleted.to_string(), "GET /tasks/completed");
        assert_eq!(Endpoint::Create.to_string(), "POST /tasks");
        assert_eq!(Endpoint::Update("42").to_string(), "POST /tasks/42");
        assert_eq!(Endpoint::Delete("42").to_string(), "DELETE /tasks/42");
        assert_eq!(
            Endpoint::Complete("42").to_string(),
            "POST /tasks/42/complete"
        );
        assert_eq!(
            Endpoint::Incomplete("42").to_string(),
            "POST /tasks/42/incomplete"
        );
    }

    #[test]
    fn test_endpoint_task_id() {
        assert_eq!(Endpoint::ListAll.task_id(), None);
        assert_eq!(Endpoint::Delete("x").task_id(), Some("x"));
        assert_eq!(Endpoint::Complete("x").op(), ServiceOp::Complete);
    }
}
