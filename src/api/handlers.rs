use crate::api::AppState;
use crate::core::validator::AnalyzeBody;
use crate::domain::model::{EmotionRequest, EmotionResult, HealthStatus};
use crate::utils::error::{DecoderError, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus::healthy(&state.config.service_name))
}

/// POST /api/analyze/text
pub async fn analyze_text(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<EmotionResult>> {
    let request = state.validator.text_request(body(payload)?)?;
    run(&state, request).await
}

/// POST /api/analyze/image
pub async fn analyze_image(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<EmotionResult>> {
    let request = state.validator.image_request(body(payload)?)?;
    run(&state, request).await
}

/// POST /api/analyze/multimodal
pub async fn analyze_multimodal(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<EmotionResult>> {
    let request = state.validator.multimodal_request(body(payload)?)?;
    run(&state, request).await
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "error_code": "NOT_FOUND" })),
    )
}

fn body(payload: std::result::Result<Json<AnalyzeBody>, JsonRejection>) -> Result<AnalyzeBody> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            DecoderError::PayloadTooLarge(rejection.body_text())
        } else {
            DecoderError::validation("body", rejection.body_text())
        }
    })
}

async fn run(state: &AppState, request: EmotionRequest) -> Result<Json<EmotionResult>> {
    state.analyzer.analyze(&request).await.map(Json)
}
