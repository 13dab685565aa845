use crate::core::normalizer;
use crate::core::prompt::build_prompt;
use crate::domain::model::{EmotionRequest, EmotionResult};
use crate::domain::ports::EmotionModel;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Instant;

/// Runs one validated request through the model and normalizes the reply.
#[derive(Clone)]
pub struct EmotionAnalyzer {
    model: Arc<dyn EmotionModel>,
}

impl EmotionAnalyzer {
    pub fn new(model: Arc<dyn EmotionModel>) -> Self {
        Self { model }
    }

    pub async fn analyze(&self, request: &EmotionRequest) -> Result<EmotionResult> {
        let input_type = request.input_type();
        let prompt = build_prompt(request);
        let started = Instant::now();

        tracing::debug!(
            model = self.model.model_name(),
            input_type = ?input_type,
            has_image = prompt.image.is_some(),
            "Invoking model"
        );

        let reply = self.model.generate(&prompt).await?;
        let result = normalizer::normalize(&reply, input_type);

        tracing::info!(
            input_type = ?input_type,
            primary_emotion = %result.primary_emotion,
            confidence = result.confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Emotion analyzed"
        );

        Ok(result)
    }
}
