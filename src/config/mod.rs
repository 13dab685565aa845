pub mod toml_config;

use crate::utils::error::{DecoderError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use std::str::FromStr;
use std::time::Duration;
use toml_config::FileConfig;

pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";
pub const DEFAULT_BUCKET: &str = "emotion-chatbot-assets";
pub const DEFAULT_SERVICE_NAME: &str = "GCP Emotion Decoding Chatbot";
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub project_id: String,
    pub location: String,
    pub model: String,
    pub bucket: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Overrides the derived `https://{location}-aiplatform.googleapis.com`.
    pub api_endpoint: Option<String>,
    pub access_token: Option<String>,
    pub metadata_host: String,
    pub service_name: String,
    pub max_body_bytes: usize,
    pub max_text_chars: usize,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: DEFAULT_LOCATION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            port: 8080,
            timeout_secs: 30,
            temperature: 0.2,
            max_output_tokens: 1024,
            api_endpoint: None,
            access_token: None,
            metadata_host: DEFAULT_METADATA_HOST.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            max_body_bytes: 20 * 1024 * 1024,
            max_text_chars: 10_000,
            log_format: LogFormat::Json,
        }
    }
}

impl ServiceConfig {
    /// Loads the optional `EMOTION_CONFIG_FILE`, then overlays the
    /// process environment.
    pub fn load() -> Result<Self> {
        let file = match std::env::var("EMOTION_CONFIG_FILE") {
            Ok(path) if !path.trim().is_empty() => Some(FileConfig::from_file(path.trim())?),
            _ => None,
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Builds the config from defaults, an optional file and a key lookup
    /// (normally the environment), later sources winning.
    pub fn from_sources<F>(file: Option<FileConfig>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(file) = file {
            config.apply_file(file)?;
        }

        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("GCP_PROJECT_ID") {
            config.project_id = v;
        }
        if let Some(v) = var("GCP_LOCATION") {
            config.location = v;
        }
        if let Some(v) = var("VERTEX_MODEL") {
            config.model = v;
        }
        if let Some(v) = var("GCS_BUCKET_NAME") {
            config.bucket = v;
        }
        if let Some(v) = var("PORT") {
            config.port = parse_value("PORT", &v)?;
        }
        if let Some(v) = var("VERTEX_TIMEOUT_SECS") {
            config.timeout_secs = parse_value("VERTEX_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("VERTEX_TEMPERATURE") {
            config.temperature = parse_value("VERTEX_TEMPERATURE", &v)?;
        }
        if let Some(v) = var("VERTEX_MAX_OUTPUT_TOKENS") {
            config.max_output_tokens = parse_value("VERTEX_MAX_OUTPUT_TOKENS", &v)?;
        }
        if let Some(v) = var("VERTEX_API_ENDPOINT") {
            config.api_endpoint = Some(v);
        }
        if let Some(v) = var("VERTEX_ACCESS_TOKEN") {
            config.access_token = Some(v);
        }
        if let Some(v) = var("GCE_METADATA_HOST") {
            config.metadata_host = v;
        }
        if let Some(v) = var("SERVICE_NAME") {
            config.service_name = v;
        }
        if let Some(v) = var("MAX_BODY_BYTES") {
            config.max_body_bytes = parse_value("MAX_BODY_BYTES", &v)?;
        }
        if let Some(v) = var("MAX_TEXT_CHARS") {
            config.max_text_chars = parse_value("MAX_TEXT_CHARS", &v)?;
        }
        if let Some(v) = var("LOG_FORMAT") {
            config.log_format = parse_log_format("LOG_FORMAT", &v)?;
        }

        if config.project_id.is_empty() {
            return Err(DecoderError::MissingConfig {
                field: "GCP_PROJECT_ID".to_string(),
            });
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<()> {
        let FileConfig { gcp, model, server } = file;

        if let Some(v) = gcp.project_id {
            self.project_id = v;
        }
        if let Some(v) = gcp.location {
            self.location = v;
        }
        if let Some(v) = gcp.bucket {
            self.bucket = v;
        }
        if let Some(v) = gcp.metadata_host {
            self.metadata_host = v;
        }
        if let Some(v) = model.name {
            self.model = v;
        }
        if model.endpoint.is_some() {
            self.api_endpoint = model.endpoint;
        }
        if let Some(v) = model.timeout_secs {
            self.timeout_secs = v;
        }
        if let Some(v) = model.temperature {
            self.temperature = v;
        }
        if let Some(v) = model.max_output_tokens {
            self.max_output_tokens = v;
        }
        if let Some(v) = server.port {
            self.port = v;
        }
        if let Some(v) = server.service_name {
            self.service_name = v;
        }
        if let Some(v) = server.max_body_bytes {
            self.max_body_bytes = v;
        }
        if let Some(v) = server.max_text_chars {
            self.max_text_chars = v;
        }
        if let Some(v) = server.log_format {
            self.log_format = parse_log_format("server.log_format", &v)?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL of the Vertex AI REST API for the configured location.
    pub fn vertex_base_url(&self) -> String {
        match &self.api_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None if self.location == "global" => "https://aiplatform.googleapis.com".to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    /// Fully qualified publisher model resource name.
    pub fn model_resource(&self) -> String {
        format!(
            "projects/{}/locations/{}/publishers/google/models/{}",
            self.project_id, self.location, self.model
        )
    }

    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/v1/{}:generateContent",
            self.vertex_base_url(),
            self.model_resource()
        )
    }
}

fn parse_value<T: FromStr>(field: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| DecoderError::InvalidConfigValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_log_format(field: &str, raw: &str) -> Result<LogFormat> {
    LogFormat::parse(raw).ok_or_else(|| DecoderError::InvalidConfigValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: "Expected 'json' or 'compact'".to_string(),
    })
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_gcp_identifier("project_id", &self.project_id)?;
        validation::validate_gcp_identifier("location", &self.location)?;
        validation::validate_non_empty_string("model", &self.model)?;
        validation::validate_bucket_name("bucket", &self.bucket)?;

        if let Some(endpoint) = &self.api_endpoint {
            validation::validate_url("api_endpoint", endpoint)?;
        }

        validation::validate_range("timeout_secs", self.timeout_secs, 1, 600)?;
        validation::validate_range("temperature", self.temperature, 0.0, 2.0)?;
        validation::validate_range("max_output_tokens", self.max_output_tokens, 1, 8192)?;
        validation::validate_range("max_text_chars", self.max_text_chars, 1, 1_000_000)?;
        validation::validate_range(
            "max_body_bytes",
            self.max_body_bytes,
            1024,
            64 * 1024 * 1024,
        )?;
        validation::validate_non_empty_string("service_name", &self.service_name)?;

        tracing::debug!("Service configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_project_only() {
        let config =
            ServiceConfig::from_sources(None, lookup(&[("GCP_PROJECT_ID", "demo-project")]))
                .unwrap();

        assert_eq!(config.project_id, "demo-project");
        assert_eq!(config.location, DEFAULT_LOCATION);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.port, 8080);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_project_is_rejected() {
        let err = ServiceConfig::from_sources(None, lookup(&[])).unwrap_err();
        assert!(matches!(err, DecoderError::MissingConfig { field } if field == "GCP_PROJECT_ID"));
    }

    #[test]
    fn test_unparseable_port_is_rejected() {
        let err = ServiceConfig::from_sources(
            None,
            lookup(&[("GCP_PROJECT_ID", "demo"), ("PORT", "eighty")]),
        )
        .unwrap_err();
        assert!(matches!(err, DecoderError::InvalidConfigValue { field, .. } if field == "PORT"));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig::from_toml_str(
            "[gcp]\nproject_id = \"file-project\"\nlocation = \"europe-west1\"\n[server]\nport = 9000\n",
        )
        .unwrap();

        let config = ServiceConfig::from_sources(
            Some(file),
            lookup(&[("GCP_LOCATION", "asia-northeast1")]),
        )
        .unwrap();

        assert_eq!(config.project_id, "file-project");
        assert_eq!(config.location, "asia-northeast1");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_generate_content_url() {
        let mut config =
            ServiceConfig::from_sources(None, lookup(&[("GCP_PROJECT_ID", "demo")])).unwrap();
        assert_eq!(
            config.generate_content_url(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo/locations/us-central1/publishers/google/models/gemini-2.0-flash-001:generateContent"
        );

        config.location = "global".to_string();
        assert!(config
            .generate_content_url()
            .starts_with("https://aiplatform.googleapis.com/v1/projects/demo/locations/global/"));

        config.api_endpoint = Some("http://127.0.0.1:9999/".to_string());
        assert!(config
            .generate_content_url()
            .starts_with("http://127.0.0.1:9999/v1/projects/demo/"));
    }

    #[test]
    fn test_validation_catches_bad_values() {
        let mut config =
            ServiceConfig::from_sources(None, lookup(&[("GCP_PROJECT_ID", "demo")])).unwrap();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());

        config.timeout_secs = 30;
        config.api_endpoint = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }
}
