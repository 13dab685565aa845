#![allow(dead_code)]

use async_trait::async_trait;
use emotion_decoder::core::prompt::Prompt;
use emotion_decoder::domain::ports::EmotionModel;
use emotion_decoder::{create_router, AppState, DecoderError, ServiceConfig, UpstreamKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// 1x1 PNG header, enough for MIME sniffing.
pub const PNG_B64: &str = "iVBORw0KGgo=";

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        project_id: "test-project".to_string(),
        access_token: Some("test-token".to_string()),
        timeout_secs: 1,
        ..ServiceConfig::default()
    }
}

/// Fake model that replies with a fixed string (or error) and counts calls.
pub struct CountingModel {
    reply: Result<String, UpstreamKind>,
    calls: AtomicUsize,
}

impl CountingModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(kind: UpstreamKind) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(kind),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmotionModel for CountingModel {
    async fn generate(&self, _prompt: &Prompt) -> emotion_decoder::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(kind) => Err(DecoderError::upstream(kind.clone(), "fake upstream failure")),
        }
    }

    fn model_name(&self) -> &str {
        "counting-fake"
    }
}

/// Serves the real router on an ephemeral port and returns its base URL.
pub async fn spawn_app(config: ServiceConfig, model: Arc<dyn EmotionModel>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());

    let app = create_router(Arc::new(AppState::new(config, model)));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}
