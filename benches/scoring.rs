use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::path::PathBuf;
use waypoint::search::coordinator::split_document_list;
use waypoint::search::model::{DocumentResults, TaskResult};
use waypoint::search::tfidf;

const VOCABULARY: [&str; 12] = [
    "whale", "ship", "sea", "captain", "harpoon", "storm", "island", "sail", "deck", "rope",
    "anchor", "compass",
];

/// Deterministic synthetic document of `words` words.
fn synthetic_document(seed: usize, words: usize) -> Vec<String> {
    (0..words)
        .map(|i| VOCABULARY[(seed * 7 + i * 13 + i / 5) % VOCABULARY.len()].to_string())
        .collect()
}

fn synthetic_results(documents: usize, terms: &[String]) -> DocumentResults {
    let mut result = TaskResult::default();
    for seed in 0..documents {
        let words = synthetic_document(seed, 2_000);
        result.add_document_data(
            &format!("book-{:05}.txt", seed),
            tfidf::create_document_data(&words, terms),
        );
    }
    std::iter::once(result).collect()
}

fn benchmark_tokenizing(c: &mut Criterion) {
    let line = "Call me Ishmael. Some years ago--never mind how long precisely--having little or no money in my purse, and nothing particular to interest me on shore, I thought I would sail about a little and see the watery part of the world.";
    c.bench_function("words_from_line", |b| {
        b.iter(|| tfidf::words_from_line(black_box(line)))
    });
}

fn benchmark_term_frequency(c: &mut Criterion) {
    let words = synthetic_document(1, 10_000);
    let terms: Vec<String> = vec!["whale".into(), "ship".into(), "compass".into()];
    c.bench_function("create_document_data_10k_words", |b| {
        b.iter(|| tfidf::create_document_data(black_box(&words), black_box(&terms)))
    });
}

fn benchmark_ranking(c: &mut Criterion) {
    let terms: Vec<String> = vec!["whale".into(), "storm".into(), "anchor".into()];
    let mut group = c.benchmark_group("documents_sorted_by_score");
    for documents in [10, 100, 1_000] {
        let results = synthetic_results(documents, &terms);
        group.bench_with_input(BenchmarkId::from_parameter(documents), &results, |b, results| {
            b.iter(|| tfidf::documents_sorted_by_score(black_box(&terms), black_box(results)))
        });
    }
    group.finish();
}

fn benchmark_partitioning(c: &mut Criterion) {
    let documents: Vec<PathBuf> = (0..10_000)
        .map(|i| PathBuf::from(format!("book-{:05}.txt", i)))
        .collect();
    c.bench_function("split_document_list_10k_over_7", |b| {
        b.iter(|| split_document_list(black_box(7), black_box(&documents)))
    });
}

criterion_group!(
    benches,
    benchmark_tokenizing,
    benchmark_term_frequency,
    benchmark_ranking,
    benchmark_partitioning
);
criterion_main!(benches);
