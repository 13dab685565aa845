use crate::utils::error::{DecoderError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(DecoderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(DecoderError::InvalidConfigValue {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(DecoderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DecoderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(DecoderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Lowercase letters, digits and hyphens only, as GCP uses for
/// project ids and region names.
pub fn validate_gcp_identifier(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;

    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(DecoderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Only lowercase letters, numbers, and hyphens are allowed".to_string(),
        });
    }

    if value.starts_with('-') || value.ends_with('-') {
        return Err(DecoderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Cannot start or end with a hyphen".to_string(),
        });
    }

    Ok(())
}

pub fn validate_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(DecoderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "Bucket name must be between 3 and 63 characters".to_string(),
        });
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Err(DecoderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "Bucket name can only contain lowercase letters, numbers, hyphens, underscores, and dots"
                .to_string(),
        });
    }

    Ok(())
}
