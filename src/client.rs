use std::time::Duration;

use reqwest::{Client, header};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::discovery::{OAuthMetadata, discover_oauth_metadata};
use crate::pkce::generate_state;
use crate::{
    AuthError, AuthorizationRequest, CallbackResult, CallbackServer, LocalServerConfig, PkcePair,
    TokenInfo, TokenResponse,
};

pub const DEFAULT_API_URL: &str = "https://api.polarsignals.com";
pub const DEFAULT_CLIENT_ID: &str = "polarsignals-cli";
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email", "offline_access"];
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    pub api_url: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub no_open: bool,
    pub callback_timeout: Duration,
    pub http_timeout: Option<Duration>,
    pub local_server: LocalServerConfig,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl AuthenticatorConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect(),
            no_open: false,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            http_timeout: Some(DEFAULT_HTTP_TIMEOUT),
            local_server: LocalServerConfig::default(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_no_open(mut self, no_open: bool) -> Self {
        self.no_open = no_open;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn with_local_server_config(mut self, local_server: LocalServerConfig) -> Self {
        self.local_server = local_server;
        self
    }
}

/// Runs one interactive authorization-code + PKCE login per call.
///
/// Every call discovers metadata, binds a fresh callback listener and
/// generates fresh PKCE and state values; nothing is reused between attempts.
#[derive(Debug, Clone)]
pub struct Authenticator {
    config: AuthenticatorConfig,
    http: Client,
}

impl Authenticator {
    pub fn new(config: AuthenticatorConfig) -> Result<Self, AuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { config, http })
    }

    pub fn with_http_client(config: AuthenticatorConfig, http: Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// Logs in, opening a browser unless `no_open` is set.
    pub async fn login(&self, cancel: &CancellationToken) -> Result<TokenInfo, AuthError> {
        let no_open = self.config.no_open;
        self.login_with(cancel, |auth| {
            crate::browser::present_authorization_url(&auth.authorization_url, no_open)
        })
        .await
    }

    /// Logs in, handing the authorization request to `on_authorize` once the
    /// callback server is accepting redirects.
    pub async fn login_with<F>(
        &self,
        cancel: &CancellationToken,
        on_authorize: F,
    ) -> Result<TokenInfo, AuthError>
    where
        F: FnOnce(&AuthorizationRequest),
    {
        let metadata = discover_oauth_metadata(&self.http, &self.config.api_url, cancel).await?;

        let mut server = CallbackServer::bind(self.config.local_server.clone())?;
        let result = self
            .authorize(&metadata, &mut server, cancel, on_authorize)
            .await;
        server.shutdown().await;
        result
    }

    async fn authorize<F>(
        &self,
        metadata: &OAuthMetadata,
        server: &mut CallbackServer,
        cancel: &CancellationToken,
        on_authorize: F,
    ) -> Result<TokenInfo, AuthError>
    where
        F: FnOnce(&AuthorizationRequest),
    {
        let auth = self.authorization_request(metadata, &server.redirect_uri())?;

        server.start()?;
        on_authorize(&auth);

        tracing::debug!(
            timeout = ?self.config.callback_timeout,
            "waiting for authorization callback"
        );
        let callback = server
            .wait_for_callback(cancel, self.config.callback_timeout)
            .await?;
        let code = validate_callback(callback, &auth.state)?;

        self.exchange_code(
            &metadata.token_endpoint,
            &code,
            &auth.pkce.code_verifier,
            &auth.redirect_uri,
            cancel,
        )
        .await
    }

    /// Builds the authorization request with fresh PKCE and state values.
    pub fn authorization_request(
        &self,
        metadata: &OAuthMetadata,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest, AuthError> {
        let pkce = PkcePair::generate()?;
        let state = generate_state()?;
        let scope = self.config.scopes.join(" ");

        let url = build_authorization_url(
            &metadata.authorization_endpoint,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("code_challenge", pkce.code_challenge.as_str()),
                ("code_challenge_method", pkce.code_challenge_method),
            ],
        )?;

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            redirect_uri: redirect_uri.to_string(),
            pkce,
            state,
            scope,
        })
    }

    pub async fn exchange_code(
        &self,
        token_endpoint: &str,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
        cancel: &CancellationToken,
    ) -> Result<TokenInfo, AuthError> {
        tracing::debug!(token_endpoint, "exchanging authorization code");
        let payload = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = self.send_token_request(token_endpoint, &payload) => result?,
        };
        response.into_token_info(chrono::Utc::now())
    }

    async fn send_token_request(
        &self,
        token_endpoint: &str,
        payload: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let exchange_error = |message: String| AuthError::TokenExchange { message };

        let response = self
            .http
            .post(token_endpoint)
            .header(header::ACCEPT, "application/json")
            .form(payload)
            .send()
            .await
            .map_err(|err| exchange_error(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| exchange_error(err.to_string()))?;

        if !status.is_success() {
            return Err(exchange_error(format!("status {}: {body}", status.as_u16())));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|err| exchange_error(format!("invalid token response: {err}")))?;
        if token.access_token.is_empty() {
            return Err(exchange_error("token response has empty access_token".to_string()));
        }
        Ok(token)
    }
}

/// Checks the callback before any exchange: provider errors first, then the
/// exact state match. Returns the authorization code.
pub fn validate_callback(
    callback: CallbackResult,
    expected_state: &str,
) -> Result<String, AuthError> {
    if let Some(error) = callback.error {
        return Err(AuthError::Provider {
            error,
            description: callback.error_description,
        });
    }
    if callback.state != expected_state {
        return Err(AuthError::StateMismatch {
            expected: expected_state.to_string(),
            received: callback.state,
        });
    }
    Ok(callback.code)
}

/// Keeps the endpoint's own query parameters; the standard ones replace any
/// pre-existing parameter with the same name.
fn build_authorization_url(endpoint: &str, params: &[(&str, &str)]) -> Result<Url, AuthError> {
    let mut url = Url::parse(endpoint)?;
    let existing: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| !params.iter().any(|(name, _)| *name == key.as_str()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(existing);
        pairs.extend_pairs(params);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::pkce::challenge_for;

    fn metadata(authorization_endpoint: &str) -> OAuthMetadata {
        serde_json::from_value(serde_json::json!({
            "authorization_endpoint": authorization_endpoint,
            "token_endpoint": "https://auth.example.com/token",
        }))
        .unwrap()
    }

    #[test]
    fn authorization_url_includes_required_params() {
        let client = Authenticator::new(AuthenticatorConfig::default()).unwrap();
        let auth = client
            .authorization_request(
                &metadata("https://auth.example.com/authorize"),
                "http://localhost:8080",
            )
            .unwrap();

        let url = Url::parse(&auth.authorization_url).unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("polarsignals-cli"));
        assert_eq!(
            pairs.get("redirect_uri").map(String::as_str),
            Some("http://localhost:8080")
        );
        assert_eq!(
            pairs.get("scope").map(String::as_str),
            Some("openid profile email offline_access")
        );
        assert_eq!(pairs.get("state"), Some(&auth.state));
        assert_eq!(pairs.get("code_challenge"), Some(&auth.pkce.code_challenge));
        assert_eq!(
            pairs.get("code_challenge_method").map(String::as_str),
            Some("S256")
        );
        assert_eq!(
            challenge_for(&auth.pkce.code_verifier),
            auth.pkce.code_challenge
        );
        assert!(!auth.authorization_url.contains(&auth.pkce.code_verifier));
    }

    #[test]
    fn authorization_url_preserves_existing_params_and_overrides_collisions() {
        let client = Authenticator::new(AuthenticatorConfig::default()).unwrap();
        let auth = client
            .authorization_request(
                &metadata("https://auth.example.com/authorize?auth_endpoint=dex&client_id=stale"),
                "http://localhost:8080",
            )
            .unwrap();

        let url = Url::parse(&auth.authorization_url).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("auth_endpoint".to_string(), "dex".to_string()));

        let client_ids: Vec<_> = pairs.iter().filter(|(key, _)| key == "client_id").collect();
        assert_eq!(client_ids.len(), 1);
        assert_eq!(client_ids[0].1, "polarsignals-cli");
        assert_eq!(pairs.len(), 8);
    }

    #[test]
    fn each_request_gets_fresh_state_and_verifier() {
        let client = Authenticator::new(AuthenticatorConfig::default()).unwrap();
        let metadata = metadata("https://auth.example.com/authorize");
        let a = client
            .authorization_request(&metadata, "http://localhost:8080")
            .unwrap();
        let b = client
            .authorization_request(&metadata, "http://localhost:8080")
            .unwrap();
        assert_ne!(a.state, b.state);
        assert_ne!(a.pkce.code_verifier, b.pkce.code_verifier);
    }

    #[test]
    fn validate_callback_rejects_provider_error_before_state() {
        let callback = CallbackResult::from_query("error=access_denied&state=wrong");
        let err = validate_callback(callback, "expected").unwrap_err();
        assert!(matches!(err, AuthError::Provider { ref error, .. } if error == "access_denied"));
    }

    #[test]
    fn validate_callback_rejects_single_character_state_difference() {
        let callback = CallbackResult::from_query("code=abc&state=expecteD");
        let err = validate_callback(callback, "expected").unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch { .. }));
    }

    #[test]
    fn validate_callback_returns_code_on_match() {
        let callback = CallbackResult::from_query("code=abc&state=expected");
        assert_eq!(validate_callback(callback, "expected").unwrap(), "abc");
    }
}
