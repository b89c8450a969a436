//! Data exchanged between the coordinator, the workers and clients.
//!
//! Everything here is serialized as JSON on the wire.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Term frequencies of one document, keyed by search term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    #[serde(default)]
    pub term_to_frequency: BTreeMap<String, f64>,
}

impl DocumentData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_term_frequency(&mut self, term: &str, frequency: f64) {
        self.term_to_frequency.insert(term.to_string(), frequency);
    }

    /// Frequency of `term`, or 0 if the term was not measured.
    pub fn frequency(&self, term: &str) -> f64 {
        self.term_to_frequency.get(term).copied().unwrap_or(0.0)
    }
}

/// Work assigned to one worker for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub documents: Vec<PathBuf>,
}

impl Task {
    pub fn new(search_terms: Vec<String>, documents: Vec<PathBuf>) -> Self {
        Self {
            search_terms,
            documents,
        }
    }
}

/// A worker's answer: term frequencies per document path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub document_to_document_data: BTreeMap<String, DocumentData>,
}

impl TaskResult {
    pub fn add_document_data(&mut self, document: &str, data: DocumentData) {
        self.document_to_document_data
            .insert(document.to_string(), data);
    }

    pub fn is_empty(&self) -> bool {
        self.document_to_document_data.is_empty()
    }
}

/// Merged worker results that remember insertion order.
///
/// A document inserted again keeps its original position but takes the newer
/// data.
#[derive(Debug, Clone, Default)]
pub struct DocumentResults {
    entries: Vec<(String, DocumentData)>,
    index: HashMap<String, usize>,
}

impl DocumentResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document: String, data: DocumentData) {
        match self.index.get(&document) {
            Some(&position) => self.entries[position].1 = data,
            None => {
                self.index.insert(document.clone(), self.entries.len());
                self.entries.push((document, data));
            }
        }
    }

    pub fn merge(&mut self, result: TaskResult) {
        for (document, data) in result.document_to_document_data {
            self.insert(document, data);
        }
    }

    pub fn get(&self, document: &str) -> Option<&DocumentData> {
        self.index.get(document).map(|&position| &self.entries[position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentData)> {
        self.entries
            .iter()
            .map(|(document, data)| (document.as_str(), data))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<TaskResult> for DocumentResults {
    fn from_iter<I: IntoIterator<Item = TaskResult>>(results: I) -> Self {
        let mut merged = DocumentResults::new();
        for result in results {
            merged.merge(result);
        }
        merged
    }
}

/// Documents sharing one exact score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBucket {
    pub score: f64,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub search_query: String,
}

impl SearchRequest {
    pub fn new(search_query: &str) -> Self {
        Self {
            search_query: search_query.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub document_name: String,
    pub score: f64,
    pub document_size: u64,
}

/// Ranked answer to a search, best score first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub relevant_documents: Vec<DocumentStats>,
}
