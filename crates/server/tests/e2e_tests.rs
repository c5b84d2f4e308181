//! End-to-end tests with mocked external dependencies.
//!
//! These tests run the full server stack in-process with mock implementations
//! for the web search API and the LLM provider.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use autosearch_core::llm::{CompletionRequest, LlmError};
use common::{fixtures, TestFixture};

/// Scripted judge replies; anything else gets an empty object.
fn judge_route(request: &CompletionRequest) -> String {
    let system = request.system.as_deref().unwrap_or("");
    if system.contains("additional_queries") {
        fixtures::first_pass_json(&[0, 1], &["oregon coast trail guide"], None)
    } else if system.contains("follow-up web search results") {
        fixtures::second_pass_json(&[0])
    } else {
        "{}".to_string()
    }
}

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint_hides_secrets() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["search"]["api_key_configured"], true);
    assert!(response.body["search"].get("api_key").is_none());
    assert_eq!(response.body["llm"]["model"], "test-model");
    assert_eq!(response.body["orchestrator"]["classifier"], "keyword");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/health").await;

    let (status, body) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("autosearch_http_requests_total"));
}

// =============================================================================
// Auto-search stream
// =============================================================================

#[tokio::test]
async fn test_auto_search_requires_query() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/auto-search").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Query is required");

    let response = fixture.get("/api/auto-search?query=%20%20").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Query is required");

    assert_eq!(fixture.searcher.search_count().await, 0);
}

#[tokio::test]
async fn test_auto_search_streams_run_to_done() {
    let fixture = TestFixture::new().await;
    fixture.searcher.set_results(fixtures::raw_hits(5)).await;
    fixture.llm.set_handler(judge_route);

    let response = fixture
        .stream("/api/auto-search?query=best%20hiking%20trails%20in%20oregon")
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.content_type.starts_with("text/event-stream"));
    assert_eq!(response.cache_control, "no-cache");

    let names: Vec<&str> = response.events.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names.first(), Some(&"category"));
    assert!(names.contains(&"query-issued"));
    assert!(names.contains(&"results-received"));
    assert!(names.contains(&"relevant-subset-selected"));
    assert!(names.contains(&"additional-queries"));
    assert_eq!(names.last(), Some(&"done"));
    assert_eq!(names.iter().filter(|n| **n == "done").count(), 1);

    let (_, category) = &response.events[0];
    assert_eq!(category["category"], "general");

    let (_, done) = response.events.last().unwrap();
    let results = done["results"].as_array().expect("results array");
    assert!(results.len() >= 2);
    assert_eq!(results[0]["title"], "Result 0");
    assert_eq!(done["rounds"], 2);

    // Initial retrieval plus one follow-up
    assert_eq!(fixture.searcher.search_count().await, 2);
}

#[tokio::test]
async fn test_auto_search_judge_failure_ends_with_error_event() {
    let fixture = TestFixture::new().await;
    fixture.searcher.set_results(fixtures::raw_hits(3)).await;
    fixture.llm.set_handler(|_| r#"{"reasoning": "no fields"}"#.to_string());

    let response = fixture.stream("/api/auto-search?query=anything").await;

    assert_eq!(response.status, StatusCode::OK);
    let (name, data) = response.events.last().expect("terminal event");
    assert_eq!(name, "error");
    assert!(data["message"]
        .as_str()
        .unwrap_or_default()
        .contains("relevance judgment failed"));
    assert!(!response.events.iter().any(|(n, _)| n == "done"));
}

#[tokio::test]
async fn test_auto_search_empty_results_still_completes() {
    let fixture = TestFixture::new().await;
    fixture.llm.set_handler(|request| {
        let system = request.system.as_deref().unwrap_or("");
        if system.contains("additional_queries") {
            fixtures::first_pass_json(&[], &[], None)
        } else {
            fixtures::second_pass_json(&[])
        }
    });

    let response = fixture.stream("/api/auto-search?query=nothing%20here").await;

    let (name, data) = response.events.last().expect("terminal event");
    assert_eq!(name, "done");
    assert_eq!(data["results"], json!([]));
}

// =============================================================================
// Query helpers
// =============================================================================

#[tokio::test]
async fn test_reformat_query() {
    let fixture = TestFixture::new().await;
    fixture.llm.push_response(
        "1. Category: research paper\n2. The user wants recent studies.\nFinal Result: Intitle:CRISPR AND after:2023-01-01",
    );

    let response = fixture
        .post(
            "/api/reformat-query",
            json!({ "query": "recent crispr studies", "date": "2024-05-01" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body["advancedQuery"],
        "intitle:crispr and after:2023-01-01"
    );

    let requests = fixture.llm.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .system
        .as_deref()
        .unwrap_or_default()
        .contains("2024-05-01"));
}

#[tokio::test]
async fn test_reformat_query_requires_query() {
    let fixture = TestFixture::new().await;

    let response = fixture.post("/api/reformat-query", json!({})).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Query is required");
    assert_eq!(fixture.llm.request_count(), 0);
}

#[tokio::test]
async fn test_reformat_query_llm_failure() {
    let fixture = TestFixture::new().await;
    fixture.llm.push_error(LlmError::Timeout(Duration::from_secs(30)));

    let response = fixture
        .post("/api/reformat-query", json!({ "query": "anything" }))
        .await;

    assert_status!(response, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_find_similar_keeps_operators_and_excludes_title() {
    let fixture = TestFixture::new().await;
    fixture.llm.push_response("\"graph neural networks AND molecule property\"");

    let response = fixture
        .post(
            "/api/find-similar",
            json!({
                "originalQuery": "gnn chemistry site:arxiv.org",
                "textChunk": "We apply message passing networks to molecular property prediction.",
                "currentTitle": "Neural Message Passing"
            }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let full = response.body["fullResponse"].as_str().unwrap();
    assert!(full.starts_with("graph neural networks AND molecule property"));
    assert!(full.contains("site:arxiv.org"));
    assert!(full.ends_with(" -intitle:\"Neural Message Passing\""));
}

#[tokio::test]
async fn test_find_similar_requires_text_chunk() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/find-similar", json!({ "originalQuery": "x" }))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "textChunk is required");
}
