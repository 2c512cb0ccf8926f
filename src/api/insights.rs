//! Personalization, operations, search and embedding endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Json, Response};
use bytes::Bytes;
use serde_json::Value;

use super::dto::{
    AnomalyRequest, EmbeddingsRequest, IndexRequest, RecommendationRequest,
    RecommendationResponse, SearchRequest, SearchResponse,
};
use super::{parse_json, respond};
use crate::error::GatewayError;
use crate::services::{CallOptions, DEFAULT_NUM_RESULTS, DEFAULT_SENSITIVITY, DEFAULT_TOP_K};
use crate::state::AppState;
use crate::transport::JsonObject;

/// `POST /personalize/recommend`
pub async fn recommend_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond("personalize_recommend", recommend(&state, &body).await)
}

/// `POST /ops/anomaly`
pub async fn anomaly_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond("ops_anomaly", anomaly(&state, &body).await)
}

/// `POST /search`
pub async fn search_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond("search", search(&state, &body).await)
}

/// `POST /index`
pub async fn index_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond("index", index(&state, &body).await)
}

/// `POST /embeddings`
pub async fn embeddings_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond("embeddings", embeddings(&state, &body).await)
}

async fn recommend(
    state: &AppState,
    body: &[u8],
) -> Result<Json<RecommendationResponse>, GatewayError> {
    let request = parse_json::<RecommendationRequest>(body)?;
    request.validate()?;
    let recommendations = state
        .services
        .personalization
        .get_recommendations(
            &request.user_id,
            Value::Object(request.context),
            request.num_results.unwrap_or(DEFAULT_NUM_RESULTS),
            &CallOptions::with_model(request.model),
        )
        .await?;
    Ok(Json(RecommendationResponse { recommendations }))
}

async fn anomaly(state: &AppState, body: &[u8]) -> Result<Json<JsonObject>, GatewayError> {
    let request = parse_json::<AnomalyRequest>(body)?;
    let report = state
        .services
        .operations
        .detect_anomalies(
            request.metrics,
            request.sensitivity.unwrap_or(DEFAULT_SENSITIVITY),
            &CallOptions::with_model(request.model),
        )
        .await?;
    Ok(Json(report))
}

async fn search(state: &AppState, body: &[u8]) -> Result<Json<SearchResponse>, GatewayError> {
    let request = parse_json::<SearchRequest>(body)?;
    request.validate()?;
    let results = state
        .services
        .indexing
        .search_documents(
            &request.query,
            request.index_name.as_deref(),
            request.filters,
            request.top_k.unwrap_or(DEFAULT_TOP_K),
            &CallOptions::with_model(request.model),
        )
        .await?;
    Ok(Json(SearchResponse { results }))
}

async fn index(state: &AppState, body: &[u8]) -> Result<Json<JsonObject>, GatewayError> {
    let request = parse_json::<IndexRequest>(body)?;
    if request.documents.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "'documents' must not be empty".into(),
        ));
    }
    let summary = state
        .services
        .indexing
        .index_documents(
            &request.documents,
            request.index_name.as_deref(),
            &CallOptions::with_model(request.model),
        )
        .await?;
    Ok(Json(summary))
}

async fn embeddings(state: &AppState, body: &[u8]) -> Result<Json<JsonObject>, GatewayError> {
    let request = parse_json::<EmbeddingsRequest>(body)?;
    request.validate()?;
    let response = state
        .client
        .embeddings(request.input, request.model, request.extra_parameters)
        .await?;
    Ok(Json(response))
}
