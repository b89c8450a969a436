//! HTTP clients for the worker and coordinator endpoints.

use crate::search::error::{SearchError, SearchResult};
use crate::search::model::{SearchRequest, SearchResponse, Task, TaskResult};
use futures_util::future::BoxFuture;
use std::time::Duration;

/// Sends tasks to workers on behalf of the coordinator.
pub trait WorkerClient: Send + Sync {
    /// Sends `task` to the worker at `address` and returns its result.
    fn send_task<'a>(&'a self, address: &'a str, task: &'a Task) -> BoxFuture<'a, SearchResult<TaskResult>>;
}

/// [`WorkerClient`] posting JSON tasks over HTTP.
#[derive(Debug, Clone)]
pub struct HttpWorkerClient {
    client: reqwest::Client,
}

impl HttpWorkerClient {
    /// Creates a client. A zero timeout means no timeout.
    pub fn new(timeout: Duration) -> SearchResult<Self> {
        let mut builder = reqwest::Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SearchError::Io(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Default for HttpWorkerClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl WorkerClient for HttpWorkerClient {
    fn send_task<'a>(&'a self, address: &'a str, task: &'a Task) -> BoxFuture<'a, SearchResult<TaskResult>> {
        Box::pin(async move {
            let response = self
                .client
                .post(address)
                .json(task)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| SearchError::worker_unreachable(address, e))?;
            let result = response.json::<TaskResult>().await?;
            Ok(result)
        })
    }
}

/// Posts a query to a coordinator's search endpoint.
pub async fn query_coordinator(address: &str, query: &str) -> SearchResult<SearchResponse> {
    let response = reqwest::Client::new()
        .post(address)
        .json(&SearchRequest::new(query))
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json::<SearchResponse>().await?)
}

/// Fetches a node's status document.
pub async fn fetch_status(address: &str) -> SearchResult<serde_json::Value> {
    let response = reqwest::get(address).await?.error_for_status()?;
    Ok(response.json::<serde_json::Value>().await?)
}
