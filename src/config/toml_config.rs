use crate::utils::error::{DecoderError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Optional file-based configuration. Every field may be omitted; the
/// environment still wins over anything set here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub gcp: GcpSection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcpSection {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub bucket: Option<String>,
    pub metadata_host: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSection {
    pub name: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub service_name: Option<String>,
    pub max_body_bytes: Option<usize>,
    pub max_text_chars: Option<usize>,
    pub log_format: Option<String>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DecoderError::Io)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content, |name| std::env::var(name).ok());

        toml::from_str(&processed).map_err(|e| DecoderError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }
}

/// Replaces `${VAR}` with the looked-up value. Unknown variables are left
/// in place so the validator can point at them.
pub fn substitute_env_vars<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
        })
        .into_owned()
}
