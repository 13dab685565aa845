use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emotion labels the model is asked to choose from.
pub const EMOTION_CATALOGUE: [&str; 10] = [
    "joy",
    "sadness",
    "anger",
    "fear",
    "surprise",
    "disgust",
    "neutral",
    "love",
    "excitement",
    "anxiety",
];

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Inline { data: Vec<u8>, mime_type: String },
    Uri { uri: String, mime_type: String },
}

impl ImageSource {
    pub fn mime_type(&self) -> &str {
        match self {
            ImageSource::Inline { mime_type, .. } | ImageSource::Uri { mime_type, .. } => {
                mime_type
            }
        }
    }
}

/// A validated analysis request. The multimodal variant always carries at
/// least one of its two inputs; `core::validator` is the only constructor
/// that callers outside tests should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmotionRequest {
    Text {
        text: String,
    },
    Image {
        image: ImageSource,
    },
    Multimodal {
        text: Option<String>,
        image: Option<ImageSource>,
    },
}

impl EmotionRequest {
    pub fn input_type(&self) -> InputType {
        match self {
            EmotionRequest::Text { .. } => InputType::Text,
            EmotionRequest::Image { .. } => InputType::Image,
            EmotionRequest::Multimodal { .. } => InputType::Multimodal,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            EmotionRequest::Text { text } => Some(text),
            EmotionRequest::Multimodal { text, .. } => text.as_deref(),
            EmotionRequest::Image { .. } => None,
        }
    }

    pub fn image(&self) -> Option<&ImageSource> {
        match self {
            EmotionRequest::Image { image } => Some(image),
            EmotionRequest::Multimodal { image, .. } => image.as_ref(),
            EmotionRequest::Text { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Image,
    Multimodal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    #[default]
    Low,
    Medium,
    High,
}

/// Extra fields reported for multimodal requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consistency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub primary_emotion: String,
    pub confidence: f64,
    pub intensity: Intensity,
    pub secondary_emotions: Vec<String>,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visual_cues: Vec<String>,
    pub input_type: InputType,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub multimodal: Option<Consistency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl EmotionResult {
    pub const UNKNOWN: &'static str = "unknown";

    /// The result reported when nothing useful could be read from the
    /// model's reply.
    pub fn unknown(input_type: InputType, raw: &str) -> Self {
        Self {
            primary_emotion: Self::UNKNOWN.to_string(),
            confidence: 0.0,
            intensity: Intensity::Low,
            secondary_emotions: Vec::new(),
            explanation: raw.trim().to_string(),
            visual_cues: Vec::new(),
            input_type,
            timestamp: Utc::now(),
            multimodal: None,
            raw_response: Some(raw.to_string()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.primary_emotion == Self::UNKNOWN
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthStatus {
    pub fn healthy(service: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }
    }
}
