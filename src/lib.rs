//! Interactive OAuth 2.0 authorization-code + PKCE login for command-line tools.
//!
//! The provider is located through its discovery document, the redirect is
//! captured by a short-lived loopback server, and the resulting token set is
//! stored in a private per-user file for later non-interactive use.

mod browser;
mod client;
mod credentials;
mod discovery;
mod error;
mod local_server;
mod pkce;
mod signal;
mod types;

pub use browser::present_authorization_url;
pub use client::{
    Authenticator, AuthenticatorConfig, DEFAULT_API_URL, DEFAULT_CALLBACK_TIMEOUT,
    DEFAULT_CLIENT_ID, DEFAULT_SCOPES, validate_callback,
};
pub use credentials::CredentialStore;
pub use discovery::{OAuthMetadata, discover_oauth_metadata, discovery_url};
pub use error::AuthError;
pub use local_server::{
    CallbackServer, DEFAULT_CALLBACK_HOST, DEFAULT_CALLBACK_PORT, LocalServerConfig, redirect_uri,
};
pub use pkce::{CODE_CHALLENGE_METHOD, PkcePair, challenge_for, generate_state};
pub use signal::spawn_interrupt_watcher;
pub use types::{AuthorizationRequest, CallbackResult, TokenInfo, TokenResponse};
pub use tokio_util::sync::CancellationToken;
