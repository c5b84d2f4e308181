//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without a search
//! API or an LLM provider.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use autosearch_core::{
    load_config_from_str,
    testing::{MockLlmClient, MockSearcher},
    Config, QueryReformulator, SimilarQueryBuilder,
};
use autosearch_server::{api::create_router, build_orchestrator, state::AppState};

/// Re-export fixtures for test convenience
pub use autosearch_core::testing::fixtures;

/// Minimal configuration; depth exploration off.
const TEST_CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 8080

[search]
api_key = "test-key"

[llm]
provider = "ollama"
model = "test-model"

[orchestrator]
classifier = "keyword"

[depth]
enabled = false
"#;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Web search (MockSearcher)
/// - LLM completions (MockLlmClient)
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock searcher - configure search results
    pub searcher: Arc<MockSearcher>,
    /// Mock LLM - script judge, reformulation and similar-query replies
    pub llm: Arc<MockLlmClient>,
}

/// Response from a JSON test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response from an event-stream request
#[derive(Debug)]
pub struct StreamResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub cache_control: String,
    /// `(event, data)` pairs in arrival order
    pub events: Vec<(String, Value)>,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        let config = load_config_from_str(TEST_CONFIG).expect("Failed to parse test config");
        Self::with_config(config).await
    }

    /// Create a test fixture with a custom configuration.
    pub async fn with_config(config: Config) -> Self {
        let searcher = Arc::new(MockSearcher::new());
        let llm = Arc::new(MockLlmClient::new());

        let orchestrator = build_orchestrator(&config, searcher.clone(), llm.clone());
        let state = Arc::new(AppState::new(
            config,
            Arc::new(orchestrator),
            QueryReformulator::new(llm.clone()),
            SimilarQueryBuilder::new(llm.clone()),
        ));

        Self {
            router: create_router(state),
            searcher,
            llm,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// GET a plain-text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// GET an event stream and collect every event until it closes.
    pub async fn stream(&self, path: &str) -> StreamResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let content_type = header("content-type");
        let cache_control = header("cache-control");

        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        StreamResponse {
            status,
            content_type,
            cache_control,
            events: parse_sse(&String::from_utf8_lossy(&body_bytes)),
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Split an event-stream body into `(event, data)` pairs. Comment lines
/// (keep-alives) are skipped.
pub fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    name = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data.push_str(rest.trim_start());
                }
            }
            let name = name?;
            let data = serde_json::from_str(&data).unwrap_or(Value::Null);
            Some((name, data))
        })
        .collect()
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
