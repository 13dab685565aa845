use crate::domain::model::{EmotionRequest, ImageSource, EMOTION_CATALOGUE};

/// Provider-neutral prompt: one instruction and at most one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub instruction: String,
    pub image: Option<ImageSource>,
}

const BASE_FIELDS: &str = r#"  "primary_emotion": string,
  "confidence": number between 0 and 100,
  "intensity": "low" | "medium" | "high",
  "secondary_emotions": [string],
  "explanation": string"#;

pub fn build_prompt(request: &EmotionRequest) -> Prompt {
    let instruction = match request {
        EmotionRequest::Text { text } => text_instruction(text),
        EmotionRequest::Image { .. } => image_instruction(),
        EmotionRequest::Multimodal { text, image } => {
            multimodal_instruction(text.as_deref(), image.is_some())
        }
    };

    Prompt {
        instruction,
        image: request.image().cloned(),
    }
}

fn catalogue() -> String {
    EMOTION_CATALOGUE.join(", ")
}

/// User text goes into a JSON string literal so quotes and newlines in it
/// cannot break out of the instruction.
fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn text_instruction(text: &str) -> String {
    format!(
        "Analyze the emotional content of the following text.\n\
         Choose the primary emotion from: {catalogue}.\n\
         Rate your confidence from 0 to 100, list any secondary emotions, \
         judge the emotional intensity and briefly explain your reasoning.\n\n\
         Text: {text}\n\n\
         Respond with a single JSON object and nothing else:\n{{\n{fields}\n}}",
        catalogue = catalogue(),
        text = quote(text),
        fields = BASE_FIELDS,
    )
}

fn image_instruction() -> String {
    format!(
        "Analyze the emotional content of this image. Look at facial expressions, \
         body language and the surrounding context.\n\
         Choose the primary emotion from: {catalogue}.\n\
         Rate your confidence from 0 to 100, list any additional emotions, \
         note the visual cues that led to your judgement and assess the intensity.\n\n\
         Respond with a single JSON object and nothing else:\n{{\n{fields},\n  \"visual_cues\": [string]\n}}",
        catalogue = catalogue(),
        fields = BASE_FIELDS,
    )
}

fn multimodal_instruction(text: Option<&str>, has_image: bool) -> String {
    let inputs = match (text, has_image) {
        (Some(_), true) => "both the text and the image provided. Consider how the text and \
                            the visual information complement or contrast each other",
        (Some(_), false) => "the text provided. No image was supplied, so set \"image_emotion\" \
                             to null",
        (None, _) => "the image provided. No text was supplied, so set \"text_emotion\" to null",
    };

    let text_line = text
        .map(|t| format!("\n\nText: {}", quote(t)))
        .unwrap_or_default();

    format!(
        "Analyze the emotional content of {inputs}.\n\
         Choose emotions from: {catalogue}.{text_line}\n\n\
         Respond with a single JSON object and nothing else:\n{{\n{fields},\n  \
         \"text_emotion\": string | null,\n  \
         \"image_emotion\": string | null,\n  \
         \"consistency\": true if text and image convey the same emotion, false otherwise, null if only one input,\n  \
         \"consistency_score\": number between 0 and 100 | null,\n  \
         \"visual_cues\": [string]\n}}",
        inputs = inputs,
        catalogue = catalogue(),
        text_line = text_line,
        fields = BASE_FIELDS,
    )
}
