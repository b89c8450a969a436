//! TF-IDF scoring.
//!
//! Pure functions over words, terms and merged worker results. Term matching is
//! case-insensitive; the ranking groups documents by exact score.

use crate::search::model::{DocumentData, DocumentResults, ScoreBucket};
use std::collections::HashMap;

fn is_separator(c: char) -> bool {
    c.is_whitespace() || (c.is_ascii_punctuation() && c != '\'')
}

/// Splits a line into words on whitespace and punctuation. Empty fragments are
/// dropped.
pub fn words_from_line(line: &str) -> Vec<String> {
    line.split(is_separator)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn words_from_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| words_from_line(line.as_ref()))
        .collect()
}

/// Share of `words` equal to `term`, ignoring case. An empty word list has
/// frequency 0.
pub fn term_frequency(words: &[String], term: &str) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let term = term.to_lowercase();
    let count = words
        .iter()
        .filter(|word| word.to_lowercase() == term)
        .count();
    count as f64 / words.len() as f64
}

pub fn create_document_data(words: &[String], terms: &[String]) -> DocumentData {
    let mut data = DocumentData::new();
    for term in terms {
        data.put_term_frequency(term, term_frequency(words, term));
    }
    data
}

/// `log10(N / n)` where `n` documents out of `N` contain the term, or 0 if
/// none does.
pub fn inverse_document_frequency(term: &str, results: &DocumentResults) -> f64 {
    let containing = results
        .iter()
        .filter(|(_, data)| data.frequency(term) > 0.0)
        .count();
    if containing == 0 {
        return 0.0;
    }
    (results.len() as f64 / containing as f64).log10()
}

fn document_score(terms: &[String], data: &DocumentData, idf: &HashMap<&str, f64>) -> f64 {
    terms
        .iter()
        .map(|term| data.frequency(term) * idf.get(term.as_str()).copied().unwrap_or(0.0))
        .sum()
}

/// Scores every document and groups them by exact score, highest first.
///
/// Within a bucket documents keep the order in which they were merged.
pub fn documents_sorted_by_score(terms: &[String], results: &DocumentResults) -> Vec<ScoreBucket> {
    let idf: HashMap<&str, f64> = terms
        .iter()
        .map(|term| (term.as_str(), inverse_document_frequency(term, results)))
        .collect();

    let mut buckets: Vec<ScoreBucket> = Vec::new();
    let mut by_score: HashMap<u64, usize> = HashMap::new();
    for (document, data) in results.iter() {
        // Adding 0.0 maps -0.0 to 0.0 so equal scores have equal bits.
        let score = document_score(terms, data, &idf) + 0.0;
        match by_score.get(&score.to_bits()) {
            Some(&position) => buckets[position].documents.push(document.to_string()),
            None => {
                by_score.insert(score.to_bits(), buckets.len());
                buckets.push(ScoreBucket {
                    score,
                    documents: vec![document.to_string()],
                });
            }
        }
    }

    buckets.sort_by(|a, b| b.score.total_cmp(&a.score));
    buckets
}
