//! Turns raw request bodies into validated [`EmotionRequest`]s.
//!
//! Everything here is local: nothing in this module talks to the network,
//! so a rejected request never reaches the model.

use crate::domain::model::{EmotionRequest, ImageSource, DEFAULT_IMAGE_MIME};
use crate::utils::error::{DecoderError, Result};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;
use url::Url;

/// Standard alphabet, with or without `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// JSON body accepted by all analysis endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeBody {
    pub text: Option<String>,
    /// Base64 image bytes, optionally as a `data:` URL.
    pub image: Option<String>,
    pub image_uri: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestValidator {
    bucket: String,
    max_text_chars: usize,
}

impl RequestValidator {
    pub fn new(bucket: impl Into<String>, max_text_chars: usize) -> Self {
        Self {
            bucket: bucket.into(),
            max_text_chars,
        }
    }

    pub fn text_request(&self, body: AnalyzeBody) -> Result<EmotionRequest> {
        let text = self
            .text(body.text.as_deref())?
            .ok_or_else(|| DecoderError::validation("text", "Text is required"))?;
        Ok(EmotionRequest::Text { text })
    }

    pub fn image_request(&self, body: AnalyzeBody) -> Result<EmotionRequest> {
        let image = self
            .image(&body)?
            .ok_or_else(|| DecoderError::validation("image", "Image data or URI is required"))?;
        Ok(EmotionRequest::Image { image })
    }

    pub fn multimodal_request(&self, body: AnalyzeBody) -> Result<EmotionRequest> {
        let text = self.text(body.text.as_deref())?;
        let image = self.image(&body)?;

        if text.is_none() && image.is_none() {
            return Err(DecoderError::validation(
                "text|image",
                "At least one of text or image is required",
            ));
        }

        Ok(EmotionRequest::Multimodal { text, image })
    }

    fn text(&self, raw: Option<&str>) -> Result<Option<String>> {
        let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let chars = text.chars().count();
        if chars > self.max_text_chars {
            return Err(DecoderError::validation(
                "text",
                format!(
                    "Text is too long ({} characters, limit {})",
                    chars, self.max_text_chars
                ),
            ));
        }

        Ok(Some(text.to_string()))
    }

    fn image(&self, body: &AnalyzeBody) -> Result<Option<ImageSource>> {
        // Only checked once an image is present
        let explicit_mime = || {
            body.mime_type
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(validate_mime)
                .transpose()
        };

        if let Some(uri) = body.image_uri.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            let explicit_mime = explicit_mime()?;
            let uri = self.resolve_uri(uri)?;
            let mime_type = explicit_mime.unwrap_or_else(|| mime_from_extension(&uri).to_string());
            return Ok(Some(ImageSource::Uri { uri, mime_type }));
        }

        if let Some(encoded) = body.image.as_deref().map(str::trim).filter(|i| !i.is_empty()) {
            let explicit_mime = explicit_mime()?;
            let (data_url_mime, payload) = split_data_url(encoded);
            // Clients often wrap base64 at 76 columns
            let payload: String = payload
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            let data = LENIENT_BASE64
                .decode(&payload)
                .map_err(|e| {
                    DecoderError::validation("image", format!("Image is not valid base64: {}", e))
                })?;
            if data.is_empty() {
                return Err(DecoderError::validation("image", "Image data is empty"));
            }

            let mime_type = explicit_mime
                .or_else(|| data_url_mime.map(str::to_string))
                .unwrap_or_else(|| sniff_mime(&data).to_string());
            return Ok(Some(ImageSource::Inline { data, mime_type }));
        }

        Ok(None)
    }

    /// Accepts `gs://`, `http://` and `https://` URLs as-is. A bare object
    /// path is resolved against the configured bucket.
    fn resolve_uri(&self, raw: &str) -> Result<String> {
        match Url::parse(raw) {
            Ok(url) => match url.scheme() {
                "gs" if url.host_str().is_some_and(|h| !h.is_empty())
                    && url.path().len() > 1 =>
                {
                    Ok(raw.to_string())
                }
                "http" | "https" => Ok(raw.to_string()),
                "gs" => Err(DecoderError::validation(
                    "image_uri",
                    "gs:// URI must name a bucket and an object",
                )),
                scheme => Err(DecoderError::validation(
                    "image_uri",
                    format!("Unsupported image URI scheme: {}", scheme),
                )),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let path = raw.trim_start_matches('/');
                if path.is_empty() || path.contains("..") {
                    return Err(DecoderError::validation(
                        "image_uri",
                        "Image path is not a valid object name",
                    ));
                }
                Ok(format!("gs://{}/{}", self.bucket, path))
            }
            Err(e) => Err(DecoderError::validation(
                "image_uri",
                format!("Invalid image URI: {}", e),
            )),
        }
    }
}

fn validate_mime(mime: &str) -> Result<String> {
    let mime = mime.to_ascii_lowercase();
    if mime.starts_with("image/") && mime.len() > "image/".len() {
        Ok(mime)
    } else {
        Err(DecoderError::validation(
            "mime_type",
            format!("Unsupported MIME type: {}", mime),
        ))
    }
}

/// Splits `data:image/png;base64,AAAA` into its MIME type and payload.
fn split_data_url(value: &str) -> (Option<&str>, &str) {
    let Some(rest) = value.strip_prefix("data:") else {
        return (None, value);
    };
    match rest.split_once(',') {
        Some((header, payload)) => {
            let mime = header
                .split(';')
                .next()
                .filter(|m| m.starts_with("image/"));
            (mime, payload)
        }
        None => (None, value),
    }
}

fn sniff_mime(data: &[u8]) -> &'static str {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => DEFAULT_IMAGE_MIME,
    }
}

fn mime_from_extension(uri: &str) -> &'static str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => DEFAULT_IMAGE_MIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER_B64: &str = "iVBORw0KGgo=";

    fn validator() -> RequestValidator {
        RequestValidator::new("emotion-chatbot-assets", 50)
    }

    fn body(text: Option<&str>, image: Option<&str>, image_uri: Option<&str>) -> AnalyzeBody {
        AnalyzeBody {
            text: text.map(str::to_string),
            image: image.map(str::to_string),
            image_uri: image_uri.map(str::to_string),
            mime_type: None,
        }
    }

    fn field_of(err: DecoderError) -> String {
        match err {
            DecoderError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_text_request_requires_text() {
        let v = validator();
        assert_eq!(field_of(v.text_request(body(None, None, None)).unwrap_err()), "text");
        assert_eq!(
            field_of(v.text_request(body(Some("   "), None, None)).unwrap_err()),
            "text"
        );

        let request = v.text_request(body(Some("  so happy  "), None, None)).unwrap();
        assert_eq!(request, EmotionRequest::Text { text: "so happy".to_string() });
    }

    #[test]
    fn test_text_length_limit() {
        let long = "a".repeat(51);
        let err = validator()
            .text_request(body(Some(&long), None, None))
            .unwrap_err();
        assert_eq!(field_of(err), "text");
    }

    #[test]
    fn test_image_request_requires_image() {
        let err = validator()
            .image_request(body(Some("text only"), None, None))
            .unwrap_err();
        assert_eq!(field_of(err), "image");
    }

    #[test]
    fn test_inline_image_is_decoded_and_sniffed() {
        let request = validator()
            .image_request(body(None, Some(PNG_HEADER_B64), None))
            .unwrap();

        match request {
            EmotionRequest::Image {
                image: ImageSource::Inline { data, mime_type },
            } => {
                assert_eq!(&data[..4], &[0x89, b'P', b'N', b'G']);
                assert_eq!(mime_type, "image/png");
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_data_url_mime_is_used() {
        let encoded = format!("data:image/webp;base64,{}", PNG_HEADER_B64);
        let request = validator()
            .image_request(body(None, Some(&encoded), None))
            .unwrap();
        assert_eq!(request.image().unwrap().mime_type(), "image/webp");
    }

    #[test]
    fn test_wrapped_and_unpadded_base64_is_accepted() {
        let v = validator();
        for encoded in ["iVBORw0K\nGgo=", "iVBORw0K\r\n Ggo=", "iVBORw0KGgo"] {
            let request = v
                .image_request(body(None, Some(encoded), None))
                .unwrap_or_else(|e| panic!("{encoded:?} rejected: {e}"));
            assert_eq!(request.image().unwrap().mime_type(), "image/png");
        }
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let err = validator()
            .image_request(body(None, Some("not base64 !!"), None))
            .unwrap_err();
        assert_eq!(field_of(err), "image");
    }

    #[test]
    fn test_uri_takes_precedence_and_infers_mime() {
        let request = validator()
            .image_request(body(None, Some(PNG_HEADER_B64), Some("gs://photos/smile.png")))
            .unwrap();
        assert_eq!(
            request.image(),
            Some(&ImageSource::Uri {
                uri: "gs://photos/smile.png".to_string(),
                mime_type: "image/png".to_string(),
            })
        );
    }

    #[test]
    fn test_bare_path_resolves_against_bucket() {
        let request = validator()
            .image_request(body(None, None, Some("/uploads/face.jpg")))
            .unwrap();
        assert_eq!(
            request.image(),
            Some(&ImageSource::Uri {
                uri: "gs://emotion-chatbot-assets/uploads/face.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
            })
        );
    }

    #[test]
    fn test_bad_uris_are_rejected() {
        let v = validator();
        for uri in ["ftp://host/file.jpg", "gs://bucket-only", "../etc/passwd"] {
            let err = v.image_request(body(None, None, Some(uri))).unwrap_err();
            assert_eq!(field_of(err), "image_uri", "uri {uri}");
        }
    }

    #[test]
    fn test_explicit_mime_must_be_image() {
        let mut b = body(None, None, Some("gs://photos/a.jpg"));
        b.mime_type = Some("application/pdf".to_string());
        let err = validator().image_request(b).unwrap_err();
        assert_eq!(field_of(err), "mime_type");
    }

    #[test]
    fn test_mime_type_ignored_without_image() {
        let mut b = body(Some("just words"), None, None);
        b.mime_type = Some("text/plain".to_string());
        let request = validator().multimodal_request(b).unwrap();
        assert_eq!(request.text(), Some("just words"));
        assert!(request.image().is_none());
    }

    #[test]
    fn test_multimodal_requires_one_input() {
        let v = validator();
        let err = v.multimodal_request(body(Some(" "), None, None)).unwrap_err();
        assert_eq!(field_of(err), "text|image");

        let text_only = v.multimodal_request(body(Some("hi"), None, None)).unwrap();
        assert_eq!(text_only.text(), Some("hi"));
        assert!(text_only.image().is_none());

        let image_only = v
            .multimodal_request(body(None, None, Some("gs://photos/a.jpg")))
            .unwrap();
        assert!(image_only.text().is_none());
        assert!(image_only.image().is_some());
    }
}
