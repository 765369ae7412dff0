use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::AuthError;

const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 32;

pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Verifier/challenge pair for a single login attempt.
///
/// The verifier stays in memory until the token exchange; only the challenge
/// travels in the authorization request.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
    pub code_challenge_method: &'static str,
}

impl PkcePair {
    pub fn generate() -> Result<Self, AuthError> {
        Ok(Self::from_verifier(random_url_safe::<VERIFIER_BYTES>()?))
    }

    pub fn from_verifier(code_verifier: impl Into<String>) -> Self {
        let code_verifier = code_verifier.into();
        let code_challenge = challenge_for(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
            code_challenge_method: CODE_CHALLENGE_METHOD,
        }
    }
}

pub fn challenge_for(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Fresh single-use `state` value binding an authorization request to its callback.
pub fn generate_state() -> Result<String, AuthError> {
    random_url_safe::<STATE_BYTES>()
}

fn random_url_safe<const N: usize>() -> Result<String, AuthError> {
    let mut bytes = [0u8; N];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| AuthError::OsRng {
            message: err.to_string(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_url_safe_pkce() {
        let pkce = PkcePair::generate().unwrap();
        for value in [&pkce.code_verifier, &pkce.code_challenge] {
            assert!(!value.contains('='), "pkce values should be unpadded");
            assert!(!value.contains('+'), "pkce values should be url safe");
            assert!(!value.contains('/'), "pkce values should be url safe");
        }
        assert_eq!(pkce.code_challenge_method, "S256");
    }

    #[test]
    fn verifier_meets_minimum_length() {
        let pkce = PkcePair::generate().unwrap();
        assert!(pkce.code_verifier.len() >= 43);
    }

    #[test]
    fn challenge_recomputes_from_verifier() {
        let pkce = PkcePair::generate().unwrap();
        assert_eq!(challenge_for(&pkce.code_verifier), pkce.code_challenge);
    }

    #[test]
    fn challenge_matches_rfc7636_example() {
        let pkce = PkcePair::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(
            pkce.code_challenge,
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn successive_states_differ() {
        let a = generate_state().unwrap();
        let b = generate_state().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }
}
