use std::sync::Arc;

use axum::extract::State;
use axum::response::{Json, Response};
use bytes::Bytes;

use super::dto::{DocumentRequest, DocumentResponse};
use super::{parse_json, respond};
use crate::error::GatewayError;
use crate::services::CallOptions;
use crate::state::AppState;

/// `POST /document/extract`
pub async fn extract_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond("document_extract", extract(&state, &body).await)
}

/// `POST /document/classify`
pub async fn classify_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    respond("document_classify", classify(&state, &body).await)
}

async fn extract(state: &AppState, body: &[u8]) -> Result<Json<DocumentResponse>, GatewayError> {
    let request = parse_json::<DocumentRequest>(body)?;
    request.validate()?;
    let extracted_data = state
        .services
        .documents
        .extract_structured_data(
            &request.document_base64,
            request.document_type.as_deref(),
            &CallOptions::with_model(request.model),
        )
        .await?;
    Ok(Json(DocumentResponse { extracted_data }))
}

async fn classify(state: &AppState, body: &[u8]) -> Result<Json<DocumentResponse>, GatewayError> {
    let request = parse_json::<DocumentRequest>(body)?;
    request.validate()?;
    let extracted_data = state
        .services
        .documents
        .classify_document(
            &request.document_base64,
            &CallOptions::with_model(request.model),
        )
        .await?;
    Ok(Json(DocumentResponse { extracted_data }))
}
