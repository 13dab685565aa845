pub mod adapters;
pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::vertex::VertexClient;
pub use api::{create_router, AppState};
pub use config::ServiceConfig;
pub use core::analyzer::EmotionAnalyzer;
pub use domain::model::{EmotionRequest, EmotionResult, HealthStatus, InputType, Intensity};
pub use utils::error::{DecoderError, Result, UpstreamKind};
