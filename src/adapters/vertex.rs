//! Vertex AI `generateContent` over REST.

use crate::config::ServiceConfig;
use crate::core::prompt::Prompt;
use crate::domain::model::ImageSource;
use crate::domain::ports::{EmotionModel, TokenProvider};
use crate::utils::error::{DecoderError, Result, UpstreamKind};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
    FileData {
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(rename = "fileUri")]
        file_uri: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

pub struct VertexClient {
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl VertexClient {
    pub fn new(config: &ServiceConfig, client: Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            tokens,
            url: config.generate_content_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    /// HTTP client with the configured upstream timeout.
    pub fn http_client(config: &ServiceConfig) -> Result<Client> {
        Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(std::time::Duration::from_secs(10)))
            .build()
            .map_err(DecoderError::Http)
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    fn request_body(&self, prompt: &Prompt) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(2);

        match &prompt.image {
            Some(ImageSource::Inline { data, mime_type }) => parts.push(Part::InlineData {
                mime_type: mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            }),
            Some(ImageSource::Uri { uri, mime_type }) => parts.push(Part::FileData {
                mime_type: mime_type.clone(),
                file_uri: uri.clone(),
            }),
            None => {}
        }
        parts.push(Part::Text(prompt.instruction.clone()));

        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: "application/json",
            },
        }
    }
}

fn status_kind(status: StatusCode) -> UpstreamKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamKind::AccessDenied,
        StatusCode::NOT_FOUND => UpstreamKind::ModelNotFound,
        StatusCode::TOO_MANY_REQUESTS => UpstreamKind::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => UpstreamKind::Timeout,
        other => UpstreamKind::Status(other.as_u16()),
    }
}

fn reply_text(response: GenerateContentResponse) -> Result<String> {
    let block_reason = response
        .prompt_feedback
        .and_then(|f| f.block_reason)
        .filter(|r| !r.is_empty());

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(DecoderError::upstream(
            UpstreamKind::Blocked(block_reason.unwrap_or_else(|| "NO_CANDIDATES".to_string())),
            "model returned no candidates",
        ));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
            return Err(DecoderError::upstream(
                UpstreamKind::Blocked(reason),
                "model returned no text",
            ));
        }
    }

    Ok(text)
}

#[async_trait]
impl EmotionModel for VertexClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let token = self.tokens.access_token().await?;
        let body = self.request_body(prompt);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(DecoderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            // The error body may name the project; it only goes to the log
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                detail = %detail.chars().take(512).collect::<String>(),
                "Vertex AI returned an error status"
            );
            return Err(DecoderError::upstream(
                status_kind(status),
                format!("generateContent returned {}", status),
            ));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(DecoderError::from_transport)?;

        reply_text(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
