use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("discover oauth metadata from {url}: {message}")]
    Discovery { url: String, message: String },

    #[error("listen on {addr}: {source}")]
    ListenerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("callback server error: {message}")]
    Server { message: String },

    #[error("timed out after {timeout:?} waiting for the authorization callback")]
    Timeout { timeout: Duration },

    #[error("login cancelled")]
    Cancelled,

    #[error("{}", format_provider_error(.error, .description.as_deref()))]
    Provider {
        error: String,
        description: Option<String>,
    },

    #[error("state mismatch (expected={expected}, received={received})")]
    StateMismatch { expected: String, received: String },

    #[error("exchange code for token: {message}")]
    TokenExchange { message: String },

    #[error("locate credentials file: {message}")]
    CredentialPath { message: String },

    #[error("read credentials file {}: {source}", path.display())]
    CredentialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write credentials file {}: {source}", path.display())]
    CredentialWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse credentials file {}: {source}", path.display())]
    CredentialParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn format_provider_error(error: &str, description: Option<&str>) -> String {
    match description {
        Some(description) if !description.is_empty() => {
            format!("authentication error: {error} ({description})")
        }
        _ => format!("authentication error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::AuthError;

    #[test]
    fn provider_error_includes_description_when_present() {
        let err = AuthError::Provider {
            error: "access_denied".to_string(),
            description: Some("user declined".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "authentication error: access_denied (user declined)"
        );

        let err = AuthError::Provider {
            error: "access_denied".to_string(),
            description: None,
        };
        assert_eq!(err.to_string(), "authentication error: access_denied");
    }
}
