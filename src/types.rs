use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::AuthError;

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub redirect_uri: String,
    pub pkce: crate::PkcePair,
    pub state: String,
    pub scope: String,
}

/// Query parameters captured from the provider's redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackResult {
    pub code: String,
    pub state: String,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackResult {
    pub fn from_query(query: &str) -> Self {
        let mut result = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => result.code = value.into_owned(),
                "state" => result.state = value.into_owned(),
                "error" if !value.is_empty() => result.error = Some(value.into_owned()),
                "error_description" if !value.is_empty() => {
                    result.error_description = Some(value.into_owned())
                }
                _ => {}
            }
        }
        result
    }

    /// Whether the request looks like an authorization redirect at all.
    pub fn is_redirect(&self) -> bool {
        !self.code.is_empty() || self.error.is_some()
    }
}

/// Raw body returned by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<i64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenResponse {
    pub fn into_token_info(self, now: DateTime<Utc>) -> Result<TokenInfo, AuthError> {
        let expiry = match self.expires_in.filter(|secs| *secs > 0) {
            Some(secs) => Some(
                Duration::try_seconds(secs)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
                    .ok_or_else(|| AuthError::TokenExchange {
                        message: format!("expires_in out of range: {secs}"),
                    })?,
            ),
            None => None,
        };

        Ok(TokenInfo {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
            token_type: self
                .token_type
                .filter(|kind| !kind.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            expiry,
        })
    }
}

/// The persisted credential record. Each successful login replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenInfo {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now,
            None => false,
        }
    }
}
