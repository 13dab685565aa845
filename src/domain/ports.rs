use crate::core::prompt::Prompt;
use crate::utils::error::Result;
use async_trait::async_trait;

/// A hosted generative model that turns a prompt into free text.
#[async_trait]
pub trait EmotionModel: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Identifier used in logs.
    fn model_name(&self) -> &str;
}

/// Source of OAuth bearer tokens for the model API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}
