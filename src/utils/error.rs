use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Why a call to the hosted model did not produce usable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamKind {
    Timeout,
    Connect,
    AccessDenied,
    RateLimited,
    ModelNotFound,
    Status(u16),
    Blocked(String),
    Malformed,
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamKind::Timeout => write!(f, "timeout"),
            UpstreamKind::Connect => write!(f, "connection failure"),
            UpstreamKind::AccessDenied => write!(f, "access denied"),
            UpstreamKind::RateLimited => write!(f, "rate limited"),
            UpstreamKind::ModelNotFound => write!(f, "model not found"),
            UpstreamKind::Status(code) => write!(f, "status {}", code),
            UpstreamKind::Blocked(reason) => write!(f, "blocked ({})", reason),
            UpstreamKind::Malformed => write!(f, "malformed response"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Upstream model error ({kind}): {message}")]
    Upstream { kind: UpstreamKind, message: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfig { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, DecoderError>;

impl DecoderError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DecoderError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(kind: UpstreamKind, message: impl Into<String>) -> Self {
        DecoderError::Upstream {
            kind,
            message: message.into(),
        }
    }

    /// Maps a transport failure from `reqwest` onto an upstream error.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            UpstreamKind::Timeout
        } else if err.is_connect() {
            UpstreamKind::Connect
        } else if err.is_decode() {
            UpstreamKind::Malformed
        } else {
            UpstreamKind::Status(err.status().map(|s| s.as_u16()).unwrap_or(0))
        };
        DecoderError::upstream(kind, err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DecoderError::Validation { .. } => StatusCode::BAD_REQUEST,
            DecoderError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DecoderError::Upstream {
                kind: UpstreamKind::Timeout,
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            DecoderError::Upstream { .. } | DecoderError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DecoderError::Validation { .. } => "VALIDATION_ERROR",
            DecoderError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            DecoderError::Upstream {
                kind: UpstreamKind::Timeout,
                ..
            } => "UPSTREAM_TIMEOUT",
            DecoderError::Upstream { .. } | DecoderError::Http(_) => "UPSTREAM_ERROR",
            DecoderError::Config { .. }
            | DecoderError::MissingConfig { .. }
            | DecoderError::InvalidConfigValue { .. } => "CONFIG_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to callers. Provider details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            DecoderError::Validation { message, .. } => message.clone(),
            DecoderError::PayloadTooLarge(_) => "Request body is too large".to_string(),
            DecoderError::Upstream {
                kind: UpstreamKind::Timeout,
                ..
            } => "The emotion model did not respond in time".to_string(),
            DecoderError::Upstream { .. } | DecoderError::Http(_) => {
                "The emotion model is currently unavailable".to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }

    pub fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = self.error_code(),
                status = status.as_u16(),
                "Request failed"
            );
        } else {
            tracing::warn!(
                error = %self,
                error_code = self.error_code(),
                "Request rejected"
            );
        }
    }
}

impl IntoResponse for DecoderError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let mut body = json!({
            "error": self.user_message(),
            "error_code": self.error_code(),
        });
        if let DecoderError::Validation { field, .. } = &self {
            body["field"] = json!(field);
        }

        (status, Json(body)).into_response()
    }
}
