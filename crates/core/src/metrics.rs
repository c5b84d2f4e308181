//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (runs, rounds)
//! - Retrieval and relevance judgment
//! - Depth exploration
//! - LLM token usage

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orchestrator - Run Metrics
// =============================================================================

/// Runs total by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autosearch_runs_total", "Total orchestration runs"),
        &["result"], // "done", "errored", "cancelled"
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "autosearch_run_duration_seconds",
            "Duration of an orchestration run",
        )
        .buckets(vec![1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        &["result"],
    )
    .unwrap()
});

/// Retrieval rounds executed per run.
pub static ROUNDS_PER_RUN: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "autosearch_rounds_per_run",
            "Number of retrieval rounds per run",
        )
        .buckets(vec![1.0, 2.0, 3.0, 4.0, 6.0, 8.0]),
        &[],
    )
    .unwrap()
});

/// Accumulated results per finished run.
pub static RESULTS_PER_RUN: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "autosearch_results_per_run",
            "Number of unique relevant results per finished run",
        )
        .buckets(vec![0.0, 1.0, 3.0, 5.0, 10.0, 20.0, 40.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Retrieval & Judgment
// =============================================================================

/// Retrievals total by result.
pub static RETRIEVALS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autosearch_retrievals_total", "Total search-engine retrievals"),
        &["backend", "result"], // result: "success", "error"
    )
    .unwrap()
});

/// Results returned per retrieval after normalization.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "autosearch_search_results",
            "Number of search results returned per retrieval",
        )
        .buckets(vec![0.0, 1.0, 3.0, 5.0, 8.0, 10.0]),
        &[],
    )
    .unwrap()
});

/// Relevance judgments by pass and result.
pub static JUDGMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autosearch_judgments_total", "Total relevance judgments"),
        &["pass", "result"], // pass: "first", "second"; result: "success", "error", "skipped"
    )
    .unwrap()
});

/// Classifications by category.
pub static CLASSIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autosearch_classifications_total", "Total query classifications"),
        &["category", "fallback"],
    )
    .unwrap()
});

// =============================================================================
// Depth Exploration
// =============================================================================

/// Depth explorations by result.
pub static DEPTH_EXPLORATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autosearch_depth_explorations_total", "Total depth explorations"),
        &["kind", "result"], // kind: "html", "pdf", "snippet"; result: "synthesized", "fallback"
    )
    .unwrap()
});

/// Navigation actions taken during depth exploration.
pub static DEPTH_NAVIGATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "autosearch_depth_navigations_total",
        "Pages followed after an action was detected",
    )
    .unwrap()
});

// =============================================================================
// LLM
// =============================================================================

/// LLM tokens used.
pub static LLM_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("autosearch_llm_tokens_total", "Total LLM tokens used"),
        &["provider", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record token usage for a provider.
pub fn record_llm_usage(provider: &str, usage: crate::llm::LlmUsage) {
    LLM_TOKENS
        .with_label_values(&[provider, "input"])
        .inc_by(usage.input_tokens as u64);
    LLM_TOKENS
        .with_label_values(&[provider, "output"])
        .inc_by(usage.output_tokens as u64);
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Runs
        Box::new(RUNS_TOTAL.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(ROUNDS_PER_RUN.clone()),
        Box::new(RESULTS_PER_RUN.clone()),
        // Retrieval & judgment
        Box::new(RETRIEVALS_TOTAL.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(JUDGMENTS_TOTAL.clone()),
        Box::new(CLASSIFICATIONS_TOTAL.clone()),
        // Depth
        Box::new(DEPTH_EXPLORATIONS.clone()),
        Box::new(DEPTH_NAVIGATIONS.clone()),
        // LLM
        Box::new(LLM_TOKENS.clone()),
    ]
}
