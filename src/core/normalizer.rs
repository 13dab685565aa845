//! Reads the model's reply into an [`EmotionResult`].
//!
//! The reply is untrusted text. Parsing goes through three stages and the
//! first one that yields a primary emotion wins:
//!
//! 1. structured: a JSON object, possibly wrapped in a markdown fence
//! 2. lenient: `key: value` lines and emotion keywords found with regexes
//! 3. default: [`EmotionResult::unknown`]
//!
//! [`normalize`] never fails.

use crate::domain::model::{Consistency, EmotionResult, InputType, Intensity, EMOTION_CATALOGUE};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static PRIMARY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:primary|overall|main|dominant)[\s_]*emotion")
        .expect("valid primary emotion pattern")
});

/// How far past a "primary emotion" label to look for the emotion itself.
const LABEL_WINDOW_WORDS: usize = 6;

static CONFIDENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)confidence[^0-9]{0,20}(\d{1,3}(?:\.\d+)?)\s*(%)?")
        .expect("valid confidence pattern")
});

static INTENSITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)intensity\W{0,5}(low|medium|moderate|high|strong|mild)")
        .expect("valid intensity pattern")
});

static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("valid word pattern"));

/// Words that commonly stand in for a catalogue emotion.
const SYNONYMS: &[(&str, &str)] = &[
    ("happy", "joy"),
    ("happiness", "joy"),
    ("joyful", "joy"),
    ("glad", "joy"),
    ("great", "joy"),
    ("delighted", "joy"),
    ("cheerful", "joy"),
    ("sad", "sadness"),
    ("unhappy", "sadness"),
    ("depressed", "sadness"),
    ("grief", "sadness"),
    ("angry", "anger"),
    ("furious", "anger"),
    ("mad", "anger"),
    ("annoyed", "anger"),
    ("afraid", "fear"),
    ("scared", "fear"),
    ("terrified", "fear"),
    ("surprised", "surprise"),
    ("shocked", "surprise"),
    ("astonished", "surprise"),
    ("disgusted", "disgust"),
    ("calm", "neutral"),
    ("loving", "love"),
    ("affection", "love"),
    ("excited", "excitement"),
    ("thrilled", "excitement"),
    ("enthusiastic", "excitement"),
    ("anxious", "anxiety"),
    ("nervous", "anxiety"),
    ("worried", "anxiety"),
];

pub fn normalize(raw: &str, input_type: InputType) -> EmotionResult {
    if let Some(result) = parse_structured(raw, input_type) {
        return result;
    }

    if let Some(result) = extract_lenient(raw, input_type) {
        tracing::debug!(
            primary_emotion = %result.primary_emotion,
            "Model reply was not JSON, used text extraction"
        );
        return result;
    }

    tracing::warn!(
        reply_len = raw.len(),
        "Could not read an emotion from the model reply, returning default"
    );
    EmotionResult::unknown(input_type, raw)
}

/// Stage 1: the reply as a JSON object.
pub fn parse_structured(raw: &str, input_type: InputType) -> Option<EmotionResult> {
    let candidate = json_candidate(raw)?;
    let value: Value = serde_json::from_str(candidate).ok()?;

    let object = match value {
        Value::Object(map) => map,
        // Some models wrap the object in a one-element array
        Value::Array(items) => match items.into_iter().next()? {
            Value::Object(map) => map,
            _ => return None,
        },
        _ => return None,
    };

    let fields = normalize_keys(object);

    let primary = lookup(
        &fields,
        &[
            "primary_emotion",
            "overall_primary_emotion",
            "overall_emotion",
            "emotion",
            "dominant_emotion",
            "primary_emotion_detected",
        ],
    )
    .and_then(emotion_name)?;

    // A nested `{"emotion": "joy", "confidence": 90}` carries its own score
    let nested_confidence = lookup(&fields, &["primary_emotion"])
        .and_then(Value::as_object)
        .and_then(|o| o.get("confidence").or_else(|| o.get("score")))
        .and_then(confidence_value);

    let confidence = lookup(&fields, &["confidence", "confidence_score", "score"])
        .and_then(confidence_value)
        .or(nested_confidence)
        .unwrap_or(0.0);

    let intensity = lookup(
        &fields,
        &["intensity", "emotional_intensity", "intensity_assessment"],
    )
    .and_then(intensity_value)
    .unwrap_or_default();

    let secondary_emotions = lookup(
        &fields,
        &[
            "secondary_emotions",
            "additional_emotions",
            "secondary_emotions_if_present",
            "other_emotions",
        ],
    )
    .map(string_list)
    .unwrap_or_default()
    .into_iter()
    .filter(|e| !e.eq_ignore_ascii_case(&primary))
    .collect();

    let explanation = lookup(
        &fields,
        &[
            "explanation",
            "brief_explanation",
            "reasoning",
            "combined_emotional_interpretation",
            "combined_interpretation",
            "interpretation",
            "analysis",
        ],
    )
    .and_then(text_value)
    .unwrap_or_default();

    let visual_cues = lookup(&fields, &["visual_cues", "cues", "visual_evidence"])
        .map(string_list)
        .unwrap_or_default();

    let multimodal = (input_type == InputType::Multimodal).then(|| consistency_fields(&fields));

    Some(EmotionResult {
        primary_emotion: primary,
        confidence,
        intensity,
        secondary_emotions,
        explanation,
        visual_cues,
        input_type,
        timestamp: Utc::now(),
        multimodal,
        raw_response: None,
    })
}

/// Stage 2: free text with recognizable labels or emotion words.
pub fn extract_lenient(raw: &str, input_type: InputType) -> Option<EmotionResult> {
    let labelled = PRIMARY_PATTERN.find(raw).and_then(|label| {
        WORD_PATTERN
            .find_iter(&raw[label.end()..])
            .take(LABEL_WINDOW_WORDS)
            .find_map(|word| canonical_emotion(word.as_str()))
            .map(str::to_string)
    });

    let mentioned = mentioned_emotions(raw);

    let primary = labelled.or_else(|| mentioned.first().cloned())?;

    let confidence = CONFIDENCE_PATTERN
        .captures(raw)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(clamp_confidence)
        .unwrap_or(0.0);

    let intensity = INTENSITY_PATTERN
        .captures(raw)
        .and_then(|c| intensity_word(&c[1]))
        .unwrap_or_default();

    let secondary_emotions = mentioned
        .into_iter()
        .filter(|e| *e != primary)
        .collect();

    Some(EmotionResult {
        primary_emotion: primary,
        confidence,
        intensity,
        secondary_emotions,
        explanation: raw.trim().to_string(),
        visual_cues: Vec::new(),
        input_type,
        timestamp: Utc::now(),
        multimodal: (input_type == InputType::Multimodal).then(Consistency::default),
        raw_response: Some(raw.to_string()),
    })
}

/// Finds the JSON text inside a reply: a ```json fence, a bare ``` fence,
/// or the outermost braces.
fn json_candidate(raw: &str) -> Option<&str> {
    if let Some((_, rest)) = raw.split_once("```json") {
        return Some(rest.split("```").next().unwrap_or(rest).trim());
    }
    if let Some((_, rest)) = raw.split_once("```") {
        let body = rest.split("```").next().unwrap_or(rest);
        // Skip a language tag such as ```JSON or ```javascript
        let body = match body.split_once('\n') {
            Some((tag, tail)) if !tag.contains('{') => tail,
            _ => body,
        };
        return Some(body.trim());
    }

    let trimmed = raw.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Snake-cases every key: `"Primary Emotion"` and `"primaryEmotion"` both
/// become `primary_emotion`. Nested objects are left alone.
fn normalize_keys(object: Map<String, Value>) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(key, value)| (snake_case(&key), value))
        .collect()
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    out.trim_matches('_').to_string()
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find(|v| !v.is_null())
}

fn emotion_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(s) => s.clone(),
        Value::Object(o) => ["emotion", "name", "label", "primary_emotion"]
            .iter()
            .find_map(|k| o.get(*k).and_then(Value::as_str))?
            .to_string(),
        Value::Array(items) => items.first().and_then(emotion_name)?,
        _ => return None,
    };

    let name = name.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    (!name.is_empty()).then_some(name)
}

fn confidence_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim().trim_end_matches('%').trim();
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    Some(clamp_confidence(number))
}

/// Fractions such as 0.85 are read as 85%.
fn clamp_confidence(number: f64) -> f64 {
    if !number.is_finite() {
        return 0.0;
    }
    let scaled = if number > 0.0 && number < 1.0 {
        number * 100.0
    } else {
        number
    };
    scaled.clamp(0.0, 100.0)
}

fn intensity_value(value: &Value) -> Option<Intensity> {
    match value {
        Value::String(s) => intensity_word(s),
        Value::Number(n) => {
            let n = n.as_f64()?;
            // Either a 0-1 fraction, a 1-10 scale or a 0-100 score
            let score = if n < 1.0 {
                n * 100.0
            } else if n <= 10.0 {
                n * 10.0
            } else {
                n
            };
            Some(if score < 34.0 {
                Intensity::Low
            } else if score < 67.0 {
                Intensity::Medium
            } else {
                Intensity::High
            })
        }
        _ => None,
    }
}

fn intensity_word(word: &str) -> Option<Intensity> {
    let word = word.trim().to_ascii_lowercase();
    if word.starts_with("low") || word.starts_with("mild") || word.starts_with("weak") {
        Some(Intensity::Low)
    } else if word.starts_with("medium") || word.starts_with("moderate") {
        Some(Intensity::Medium)
    } else if word.starts_with("high") || word.starts_with("strong") || word.starts_with("intense")
    {
        Some(Intensity::High)
    } else {
        None
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Accepts `["a", "b"]`, `[{"emotion": "a"}]` or `"a, b"`.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => emotion_name(item),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split([',', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn consistency_fields(fields: &Map<String, Value>) -> Consistency {
    let text_emotion = lookup(
        fields,
        &["text_emotion", "text_based_emotion", "emotion_from_text"],
    )
    .and_then(emotion_name);

    let image_emotion = lookup(
        fields,
        &["image_emotion", "image_based_emotion", "emotion_from_image"],
    )
    .and_then(emotion_name);

    let raw = lookup(
        fields,
        &[
            "consistency",
            "consistent",
            "consistency_analysis",
            "aligned",
        ],
    );

    let mut consistency = raw.and_then(consistency_flag);
    let consistency_score = lookup(fields, &["consistency_score"])
        .and_then(confidence_value)
        .or_else(|| raw.filter(|v| v.is_number()).and_then(confidence_value));

    if consistency.is_none() {
        consistency = consistency_score.map(|score| score >= 50.0);
    }
    if consistency.is_none() {
        if let (Some(t), Some(i)) = (&text_emotion, &image_emotion) {
            consistency = Some(t == i);
        }
    }

    Consistency {
        text_emotion,
        image_emotion,
        consistency,
        consistency_score,
    }
}

fn consistency_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            if s.starts_with("misaligned")
                || s.starts_with("inconsistent")
                || s.starts_with("not ")
                || s.starts_with("contradict")
                || s == "false"
                || s == "no"
            {
                Some(false)
            } else if s.starts_with("aligned")
                || s.starts_with("consistent")
                || s == "true"
                || s == "yes"
            {
                Some(true)
            } else {
                None
            }
        }
        Value::Object(o) => ["aligned", "consistent", "status", "consistency"]
            .iter()
            .find_map(|k| o.get(*k).and_then(consistency_flag)),
        _ => None,
    }
}

fn canonical_emotion(word: &str) -> Option<&'static str> {
    let word = word.to_ascii_lowercase();
    EMOTION_CATALOGUE
        .iter()
        .copied()
        .find(|e| *e == word)
        .or_else(|| {
            SYNONYMS
                .iter()
                .find(|(synonym, _)| *synonym == word)
                .map(|(_, emotion)| *emotion)
        })
}

/// Catalogue emotions in order of first mention, without repeats.
fn mentioned_emotions(raw: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for word in WORD_PATTERN.find_iter(raw) {
        if let Some(emotion) = canonical_emotion(word.as_str()) {
            if !found.iter().any(|e| e == emotion) {
                found.push(emotion.to_string());
            }
        }
    }
    found
}
