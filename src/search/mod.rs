//! Distributed TF-IDF search.
//!
//! Workers compute term frequencies for their shard of the documents; the
//! coordinator fans a query out to every registered worker and ranks the
//! merged results.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod tfidf;
pub mod worker;

pub use client::{HttpWorkerClient, WorkerClient};
pub use coordinator::SearchCoordinator;
pub use error::{SearchError, SearchResult};
pub use model::{DocumentData, DocumentStats, SearchRequest, SearchResponse, Task, TaskResult};
pub use worker::SearchWorker;
