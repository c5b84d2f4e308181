//! One-shot query helpers: reformulation and similar-page queries.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use autosearch_core::BrainError;

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReformatQueryRequest {
    #[serde(default)]
    pub query: Option<String>,
    /// `YYYY-MM-DD`; today when absent.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReformatQueryResponse {
    pub advanced_query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindSimilarRequest {
    #[serde(default)]
    pub original_query: Option<String>,
    #[serde(default)]
    pub text_chunk: Option<String>,
    #[serde(default)]
    pub current_title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindSimilarResponse {
    pub full_response: String,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn brain_failure(e: BrainError) -> (StatusCode, Json<ErrorResponse>) {
    warn!(error = %e, "Query helper failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/reformat-query
///
/// Rewrites a natural-language question into an operator-rich search query.
pub async fn reformat_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReformatQueryRequest>,
) -> Result<Json<ReformatQueryResponse>, impl IntoResponse> {
    let Some(query) = non_blank(request.query.as_deref()) else {
        return Err(error_response(StatusCode::BAD_REQUEST, "Query is required"));
    };
    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());

    let reformulation = state
        .reformulator()
        .reformulate(query, date)
        .await
        .map_err(brain_failure)?;

    info!(query = %query, advanced_query = %reformulation.advanced_query, "Query reformulated");
    Ok(Json(ReformatQueryResponse {
        advanced_query: reformulation.advanced_query,
    }))
}

/// POST /api/find-similar
///
/// Builds a query for pages like the one the text chunk came from.
pub async fn find_similar(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FindSimilarRequest>,
) -> Result<Json<FindSimilarResponse>, impl IntoResponse> {
    let Some(text_chunk) = non_blank(request.text_chunk.as_deref()) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "textChunk is required",
        ));
    };

    let similar = state
        .similar()
        .build(
            request.original_query.as_deref(),
            text_chunk,
            request.current_title.as_deref(),
        )
        .await
        .map_err(brain_failure)?;

    Ok(Json(FindSimilarResponse {
        full_response: similar.full_response,
    }))
}
