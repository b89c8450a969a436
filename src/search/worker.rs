//! Module for the search worker.
//!
//! A worker reads the documents named in a task and reports each one's term
//! frequencies. It never ranks; that happens on the coordinator.

use crate::metrics::{MALFORMED_PAYLOAD_COUNTER, TASK_COUNTER};
use crate::search::error::SearchResult;
use crate::search::model::{Task, TaskResult};
use crate::search::tfidf;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// Computes term frequencies for the documents of a task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchWorker;

impl SearchWorker {
    pub const ENDPOINT: &'static str = "/task";

    pub fn new() -> Self {
        SearchWorker
    }

    pub fn endpoint(&self) -> &'static str {
        Self::ENDPOINT
    }

    /// Decodes a task, processes it and encodes the result. A body that does
    /// not decode yields an empty result.
    pub fn handle_request(&self, payload: &[u8]) -> Vec<u8> {
        let result = match serde_json::from_slice::<Task>(payload) {
            Ok(task) => self.process_task(&task),
            Err(e) => {
                warn!("Malformed task payload: {}", e);
                MALFORMED_PAYLOAD_COUNTER.inc();
                TaskResult::default()
            }
        };
        serde_json::to_vec(&result).unwrap_or_else(|_| b"{}".to_vec())
    }

    /// Reads every document of the task. Documents that cannot be read are
    /// skipped.
    pub fn process_task(&self, task: &Task) -> TaskResult {
        info!(
            "Received {} documents to process for terms {:?}",
            task.documents.len(),
            task.search_terms
        );
        TASK_COUNTER.inc();

        let mut result = TaskResult::default();
        for document in &task.documents {
            match read_words(document) {
                Ok(words) => {
                    let data = tfidf::create_document_data(&words, &task.search_terms);
                    result.add_document_data(&document.to_string_lossy(), data);
                }
                Err(e) => warn!("Skipping document {}: {}", document.display(), e),
            }
        }
        debug!("Processed {} documents", result.document_to_document_data.len());
        result
    }
}

fn read_words(path: &Path) -> SearchResult<Vec<String>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    Ok(tfidf::words_from_lines(&lines))
}
