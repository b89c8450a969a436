//! Module for the search coordinator.
//!
//! The coordinator runs on the elected leader. For each query it snapshots the
//! worker registry, splits its document set into one contiguous shard per
//! worker, dispatches the shards in parallel and ranks the merged results.
//! A worker whose call fails is left out of the ranking; the query still
//! succeeds with what the other workers returned.

use crate::cluster::registry::ServiceRegistry;
use crate::metrics::{MALFORMED_PAYLOAD_COUNTER, SEARCH_COUNTER, WORKER_FAILURE_COUNTER};
use crate::search::client::WorkerClient;
use crate::search::error::{SearchError, SearchResult};
use crate::search::model::{
    DocumentResults, DocumentStats, ScoreBucket, SearchRequest, SearchResponse, Task, TaskResult,
};
use crate::search::tfidf;
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
struct DocumentSource {
    dir: PathBuf,
    pattern: String,
}

pub struct SearchCoordinator {
    registry: Arc<ServiceRegistry>,
    client: Arc<dyn WorkerClient>,
    documents: RwLock<Vec<PathBuf>>,
    source: Option<DocumentSource>,
    documents_stale: AtomicBool,
}

impl SearchCoordinator {
    pub const ENDPOINT: &'static str = "/search";

    /// Creates a coordinator with an empty document set.
    pub fn new(registry: Arc<ServiceRegistry>, client: Arc<dyn WorkerClient>) -> Self {
        Self {
            registry,
            client,
            documents: RwLock::new(Vec::new()),
            source: None,
            documents_stale: AtomicBool::new(false),
        }
    }

    /// Creates a coordinator whose documents are the files in `dir` matching
    /// `pattern`.
    pub fn from_directory(
        registry: Arc<ServiceRegistry>,
        client: Arc<dyn WorkerClient>,
        dir: &Path,
        pattern: &str,
    ) -> SearchResult<Self> {
        let coordinator = Self {
            source: Some(DocumentSource {
                dir: dir.to_path_buf(),
                pattern: pattern.to_string(),
            }),
            ..Self::new(registry, client)
        };
        coordinator.reload_documents()?;
        Ok(coordinator)
    }

    pub fn with_documents(self, documents: Vec<PathBuf>) -> Self {
        *self.documents.write() = documents;
        self
    }

    pub fn endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    pub fn documents(&self) -> Vec<PathBuf> {
        self.documents.read().clone()
    }

    /// Re-reads the document directory. Returns the number of documents.
    pub fn reload_documents(&self) -> SearchResult<usize> {
        let Some(source) = &self.source else {
            return Ok(self.documents.read().len());
        };
        let documents = read_document_list(&source.dir, &source.pattern)?;
        info!(
            "Loaded {} documents from {}",
            documents.len(),
            source.dir.display()
        );
        let count = documents.len();
        *self.documents.write() = documents;
        Ok(count)
    }

    /// Schedules a reload of the document directory before the next query.
    /// Nothing is read from disk here.
    pub fn mark_documents_stale(&self) {
        self.documents_stale.store(true, Ordering::SeqCst);
    }

    pub fn documents_stale(&self) -> bool {
        self.documents_stale.load(Ordering::SeqCst)
    }

    fn reload_if_stale(&self) {
        if !self.documents_stale.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.reload_documents() {
            warn!("Keeping the previous document set: {}", e);
            self.documents_stale.store(true, Ordering::SeqCst);
        }
    }

    /// Decodes a search request, runs it and encodes the response. A body that
    /// does not decode yields an empty response.
    pub async fn handle_request(&self, payload: &[u8]) -> Vec<u8> {
        let response = match serde_json::from_slice::<SearchRequest>(payload) {
            Ok(request) => self.search(&request.search_query).await,
            Err(e) => {
                warn!("Malformed search payload: {}", e);
                MALFORMED_PAYLOAD_COUNTER.inc();
                SearchResponse::default()
            }
        };
        serde_json::to_vec(&response).unwrap_or_else(|_| b"{}".to_vec())
    }

    /// Runs a query against the currently registered workers.
    pub async fn search(&self, query: &str) -> SearchResponse {
        info!("Received search query: {}", query);
        SEARCH_COUNTER.inc();
        let terms = tfidf::words_from_line(query);

        let workers = self.registry.get_addresses();
        if workers.is_empty() {
            info!("{}", SearchError::NoWorkersAvailable);
            return SearchResponse::default();
        }

        self.reload_if_stale();
        let documents = self.documents();
        let shards = split_document_list(workers.len(), &documents);
        let tasks = create_tasks(&terms, shards);
        let results = self.send_tasks_to_workers(&workers, &tasks).await;

        SearchResponse {
            relevant_documents: aggregate_results(results, &terms),
        }
    }

    /// Dispatches the i-th task to the i-th worker concurrently and waits for
    /// every call. Workers without a task are not contacted.
    pub async fn send_tasks_to_workers(&self, workers: &[String], tasks: &[Task]) -> Vec<TaskResult> {
        let calls = workers.iter().zip(tasks).map(|(address, task)| async move {
            (address, self.client.send_task(address, task).await)
        });

        let mut results = Vec::with_capacity(tasks.len());
        for (address, outcome) in join_all(calls).await {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    WORKER_FAILURE_COUNTER.inc();
                    if e.is_recoverable() {
                        warn!("Excluding worker {} from aggregation: {}", address, e);
                    } else {
                        error!(
                            "Excluding worker {} from aggregation ({} error): {}",
                            address,
                            e.category(),
                            e
                        );
                    }
                }
            }
        }
        info!("Received {}/{} results", results.len(), tasks.len());
        results
    }
}

/// Splits `documents` into at most `workers` contiguous shards whose sizes
/// differ by at most one. Empty shards are not produced.
pub fn split_document_list(workers: usize, documents: &[PathBuf]) -> Vec<Vec<PathBuf>> {
    if workers == 0 {
        return Vec::new();
    }
    let base = documents.len() / workers;
    let larger = documents.len() % workers;

    let mut shards = Vec::with_capacity(workers.min(documents.len()));
    let mut start = 0;
    for index in 0..workers {
        let size = base + usize::from(index < larger);
        if size == 0 {
            break;
        }
        shards.push(documents[start..start + size].to_vec());
        start += size;
    }
    shards
}

pub fn create_tasks(terms: &[String], shards: Vec<Vec<PathBuf>>) -> Vec<Task> {
    shards
        .into_iter()
        .map(|documents| Task::new(terms.to_vec(), documents))
        .collect()
}

/// Merges worker results in order and ranks them.
pub fn aggregate_results(results: Vec<TaskResult>, terms: &[String]) -> Vec<DocumentStats> {
    let merged: DocumentResults = results.into_iter().collect();
    debug!("Calculating score for {} documents", merged.len());
    let buckets = tfidf::documents_sorted_by_score(terms, &merged);
    sort_documents_by_score(buckets)
}

/// Flattens ranked buckets into document stats, reading each file's name and
/// current size.
pub fn sort_documents_by_score(buckets: Vec<ScoreBucket>) -> Vec<DocumentStats> {
    let mut stats = Vec::new();
    for bucket in buckets {
        for document in bucket.documents {
            let path = Path::new(&document);
            let document_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| document.clone());
            let document_size = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
            stats.push(DocumentStats {
                document_name,
                score: bucket.score,
                document_size,
            });
        }
    }
    stats
}

/// Lists the files in `dir` matching `pattern`, sorted by path.
pub fn read_document_list(dir: &Path, pattern: &str) -> SearchResult<Vec<PathBuf>> {
    let full_pattern = dir.join(pattern);
    let entries = glob::glob(&full_pattern.to_string_lossy())
        .map_err(|e| SearchError::Io(format!("invalid document pattern {}: {}", pattern, e)))?;

    let mut documents = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => documents.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable document entry: {}", e),
        }
    }
    documents.sort();
    Ok(documents)
}
