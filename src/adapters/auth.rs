use crate::domain::ports::TokenProvider;
use crate::utils::error::{DecoderError, Result, UpstreamKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// A fixed token, e.g. from `gcloud auth print-access-token` for local runs.
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Service account token from the GCE / Cloud Run metadata server.
pub struct MetadataServerToken {
    client: Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    /// `host` may carry a port, as `GCE_METADATA_HOST` allows.
    pub fn new(client: Client, host: &str) -> Self {
        Self {
            client,
            url: format!("http://{}{}", host.trim_end_matches('/'), TOKEN_PATH),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<MetadataToken> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                DecoderError::upstream(
                    UpstreamKind::AccessDenied,
                    format!("metadata server unreachable: {}", e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecoderError::upstream(
                UpstreamKind::AccessDenied,
                format!("metadata server returned {}", status),
            ));
        }

        response.json::<MetadataToken>().await.map_err(|e| {
            DecoderError::upstream(
                UpstreamKind::AccessDenied,
                format!("unreadable metadata token: {}", e),
            )
        })
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.token.clone());
            }
        }

        tracing::debug!(url = %self.url, "Fetching access token from metadata server");
        let fresh = self.fetch().await?;
        let token = fresh.access_token.clone();
        *cached = Some(CachedToken {
            token: fresh.access_token,
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });

        Ok(token)
    }
}
