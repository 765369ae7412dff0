use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::AuthError;

const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";

/// Authorization server metadata as published at the well-known discovery path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthMetadata {
    #[serde(default)]
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
}

pub fn discovery_url(api_url: &str) -> String {
    format!("{}{WELL_KNOWN_PATH}", api_url.trim_end_matches('/'))
}

/// Fetches the discovery document once. No retries.
pub async fn discover_oauth_metadata(
    http: &Client,
    api_url: &str,
    cancel: &CancellationToken,
) -> Result<OAuthMetadata, AuthError> {
    let url = discovery_url(api_url);
    tracing::debug!(%url, "fetching oauth metadata");

    tokio::select! {
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        result = fetch(http, &url) => result,
    }
}

async fn fetch(http: &Client, url: &str) -> Result<OAuthMetadata, AuthError> {
    let discovery_error = |message: String| AuthError::Discovery {
        url: url.to_string(),
        message,
    };

    let response = http
        .get(url)
        .send()
        .await
        .map_err(|err| discovery_error(err.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(discovery_error(format!("status {}", status.as_u16())));
    }

    let body = response
        .text()
        .await
        .map_err(|err| discovery_error(err.to_string()))?;

    serde_json::from_str(&body).map_err(|err| discovery_error(format!("decode metadata: {err}")))
}
