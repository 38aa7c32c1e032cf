//! HTTP adapter for the task service
//!
//! Sends JSON requests to a single base origin. Every response is checked
//! for a success status and decoded into typed records before it reaches
//! the store, so malformed payloads surface as [`ServiceError::Decode`]
//! instead of half-parsed data.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Endpoint, TaskService};
use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{CreateTaskRequest, Task, UpdateTaskRequest};

/// Longest plain-text error body passed on as a reason
const MAX_REASON_LEN: usize = 200;

/// Task service client over HTTP
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: Client,
    base_url: Url,
}

/// Error bodies the server may send alongside a failure status
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Message { message: String },
    Error { error: String },
    Text(String),
}

impl HttpTaskService {
    /// Create a client for the service at `base_url`
    ///
    /// `timeout` bounds each request from connect to the end of the body.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid task service URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Task service URL cannot be used as a base: {}", base_url);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Create a client from the loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    /// The origin all requests are sent to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, endpoint: &Endpoint<'_>) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(endpoint.segments());
        }
        url
    }

    /// Send the request and return the body of a successful response
    async fn send<B>(&self, endpoint: Endpoint<'_>, body: Option<&B>) -> ServiceResult<String>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.url_for(&endpoint);
        let method = match endpoint.method() {
            "GET" => Method::GET,
            "DELETE" => Method::DELETE,
            _ => Method::POST,
        };
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| {
            warn!("{} failed: {}", endpoint, source);
            ServiceError::Transport {
                endpoint: endpoint.to_string(),
                source,
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ServiceError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;

        if !status.is_success() {
            warn!("{} returned {}", endpoint, status);
            return Err(ServiceError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                reason: extract_reason(&text),
            });
        }

        Ok(text)
    }

    async fn execute<T, B>(&self, endpoint: Endpoint<'_>, body: Option<&B>) -> ServiceResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let text = self.send(endpoint, body).await?;
        decode(&endpoint, &text)
    }

    async fn fetch_task<B>(&self, endpoint: Endpoint<'_>, body: Option<&B>) -> ServiceResult<Task>
    where
        B: Serialize + Sync + ?Sized,
    {
        let task: Task = self.execute(endpoint, body).await?;
        check_task(&endpoint, task)
    }

    async fn fetch_tasks(&self, endpoint: Endpoint<'_>) -> ServiceResult<Vec<Task>> {
        let tasks: Vec<Task> = self.execute::<_, ()>(endpoint, None).await?;
        tasks
            .into_iter()
            .map(|task| check_task(&endpoint, task))
            .collect()
    }
}

fn decode<T: DeserializeOwned>(endpoint: &Endpoint<'_>, text: &str) -> ServiceResult<T> {
    serde_json::from_str(text).map_err(|e| {
        warn!("{} returned a malformed body: {}", endpoint, e);
        ServiceError::Decode {
            endpoint: endpoint.to_string(),
            details: e.to_string(),
        }
    })
}

/// Apply client-side schema checks to a decoded task
fn check_task(endpoint: &Endpoint<'_>, task: Task) -> ServiceResult<Task> {
    task.validate().map_err(|details| ServiceError::Decode {
        endpoint: endpoint.to_string(),
        details,
    })?;
    if !task.has_consistent_dates() {
        warn!(
            "{} returned task {} with inconsistent completion date",
            endpoint, task.id
        );
    }
    Ok(task)
}

/// Pull a human-readable reason out of an error response body
fn extract_reason(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Message { message }) => Some(message),
        Ok(ErrorBody::Error { error }) => Some(error),
        Ok(ErrorBody::Text(text)) => Some(text),
        // Structured bodies without a known field carry no usable reason
        Err(_) if body.starts_with('{') || body.starts_with('[') => None,
        Err(_) if body.len() <= MAX_REASON_LEN && !body.starts_with('<') => {
            Some(body.to_string())
        }
        Err(_) => None,
    }
}

impl TaskService for HttpTaskService {
    async fn list_all(&self) -> ServiceResult<Vec<Task>> {
        self.fetch_tasks(Endpoint::ListAll).await
    }

    async fn list_completed(&self) -> ServiceResult<Vec<Task>> {
        self.fetch_tasks(Endpoint::ListCompleted).await
    }

    async fn create(&self, text: &str) -> ServiceResult<Task> {
        let body = CreateTaskRequest {
            text: text.to_string(),
        };
        self.fetch_task(Endpoint::Create, Some(&body)).await
    }

    async fn update(&self, id: &str, text: &str) -> ServiceResult<Task> {
        let body = UpdateTaskRequest {
            text: text.to_string(),
        };
        self.fetch_task(Endpoint::Update(id), Some(&body)).await
    }

    async fn delete(&self, id: &str) -> ServiceResult<String> {
        let endpoint = Endpoint::Delete(id);
        let text = self.send::<()>(endpoint, None).await?;
        // 204 No Content: the server deleted what was asked for
        if text.trim().is_empty() {
            return Ok(id.to_string());
        }
        decode(&endpoint, &text)
    }

    async fn complete(&self, id: &str) -> ServiceResult<Task> {
        self.fetch_task::<()>(Endpoint::Complete(id), None).await
    }

    async fn incomplete(&self, id: &str) -> ServiceResult<Task> {
        self.fetch_task::<()>(Endpoint::Incomplete(id), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(base: &str) -> HttpTaskService {
        HttpTaskService::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_for_endpoints() {
        let svc = service("http://localhost:8080");
        assert_eq!(
            svc.url_for(&Endpoint::ListAll).as_str(),
            "http://localhost:8080/tasks"
        );
        assert_eq!(
            svc.url_for(&Endpoint::Complete("abc")).as_str(),
            "http://localhost:8080/tasks/abc/complete"
        );
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let svc = service("http://example.com/api/");
        assert_eq!(
            svc.url_for(&Endpoint::Delete("7")).as_str(),
            "http://example.com/api/tasks/7"
        );
    }

    #[test]
    fn test_url_for_escapes_ids() {
        let svc = service("http://localhost:8080");
        assert_eq!(
            svc.url_for(&Endpoint::Update("a/b")).as_str(),
            "http://localhost:8080/tasks/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpTaskService::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpTaskService::new("mailto:me@example.com", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_extract_reason() {
        assert_eq!(
            extract_reason(r#"{"message":"Task not found"}"#),
            Some("Task not found".to_string())
        );
        assert_eq!(
            extract_reason(r#"{"error":"bad text"}"#),
            Some("bad text".to_string())
        );
        assert_eq!(extract_reason(r#""gone""#), Some("gone".to_string()));
        assert_eq!(extract_reason("Service Unavailable"), Some("Service Unavailable".to_string()));
        assert_eq!(extract_reason(r#"{"code":17}"#), None);
        assert_eq!(extract_reason("<html>oops</html>"), None);
        assert_eq!(extract_reason("   "), None);
    }
}
