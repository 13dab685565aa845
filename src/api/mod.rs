// HTTP surface: router assembly, shared state and middleware.
//
// Endpoints:
// - GET  /api/health
// - POST /api/analyze/text
// - POST /api/analyze/image
// - POST /api/analyze/multimodal

pub mod handlers;
pub mod middleware;

use crate::config::ServiceConfig;
use crate::core::analyzer::EmotionAnalyzer;
use crate::core::validator::RequestValidator;
use crate::domain::ports::EmotionModel;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Read-only state shared by all requests.
pub struct AppState {
    pub config: ServiceConfig,
    pub validator: RequestValidator,
    pub analyzer: EmotionAnalyzer,
}

impl AppState {
    pub fn new(config: ServiceConfig, model: Arc<dyn EmotionModel>) -> Self {
        let validator = RequestValidator::new(config.bucket.clone(), config.max_text_chars);
        Self {
            config,
            validator,
            analyzer: EmotionAnalyzer::new(model),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/analyze/text", post(handlers::analyze_text))
        .route("/api/analyze/image", post(handlers::analyze_image))
        .route("/api/analyze/multimodal", post(handlers::analyze_multimodal))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
