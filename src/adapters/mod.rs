// Adapters layer: concrete implementations of the domain ports for Google Cloud.

pub mod auth;
pub mod vertex;

use crate::config::ServiceConfig;
use crate::domain::ports::TokenProvider;
use crate::utils::error::Result;
use auth::{MetadataServerToken, StaticToken};
use std::sync::Arc;
use vertex::VertexClient;

/// Wires the Vertex AI client with whichever token source the config selects.
pub fn vertex_client(config: &ServiceConfig) -> Result<VertexClient> {
    let http = VertexClient::http_client(config)?;

    let tokens: Arc<dyn TokenProvider> = match &config.access_token {
        Some(token) => {
            tracing::info!("Using static access token from VERTEX_ACCESS_TOKEN");
            Arc::new(StaticToken::new(token.clone()))
        }
        None => {
            tracing::info!(host = %config.metadata_host, "Using metadata server credentials");
            Arc::new(MetadataServerToken::new(http.clone(), &config.metadata_host))
        }
    };

    Ok(VertexClient::new(config, http, tokens))
}
