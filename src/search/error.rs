use thiserror::Error;

/// Errors raised by the search pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    /// A dispatched task's call failed; the worker is excluded from aggregation.
    #[error("Worker {address} unreachable: {reason}")]
    WorkerUnreachable { address: String, reason: String },

    /// A request or response could not be decoded.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// The registry snapshot was empty at dispatch time.
    #[error("No search workers currently available")]
    NoWorkersAvailable,
}

pub type SearchResult<T> = Result<T, SearchError>;

impl SearchError {
    pub fn worker_unreachable(address: &str, reason: impl ToString) -> Self {
        SearchError::WorkerUnreachable {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the query can still produce a (possibly partial) answer.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SearchError::WorkerUnreachable { .. } | SearchError::NoWorkersAvailable
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            SearchError::WorkerUnreachable { .. } => "worker",
            SearchError::MalformedPayload(_) => "payload",
            SearchError::Io(_) => "io",
            SearchError::NoWorkersAvailable => "registry",
        }
    }
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::MalformedPayload(err.to_string())
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        let address = err
            .url()
            .map(|url| url.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if err.is_decode() {
            SearchError::MalformedPayload(err.to_string())
        } else {
            SearchError::WorkerUnreachable {
                address,
                reason: err.to_string(),
            }
        }
    }
}
