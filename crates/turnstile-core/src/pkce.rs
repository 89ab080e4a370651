//! PKCE (RFC 7636) material for the authorization-code flow.

use crate::crypto;

/// A code verifier and its S256 challenge, plus the CSRF `state` that travels with them.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

pub const CHALLENGE_METHOD: &str = "S256";

impl PkceChallenge {
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);

        Self {
            code_verifier,
            code_challenge,
            state: generate_state(),
        }
    }
}

/// 32 random bytes, base64url: 43 characters from the unreserved set `[A-Za-z0-9-_]`.
pub fn generate_code_verifier() -> String {
    crypto::random_token::<32>()
}

/// `BASE64URL(SHA256(verifier))` without padding.
pub fn generate_code_challenge(code_verifier: &str) -> String {
    crypto::sha256_base64url(code_verifier)
}

pub fn generate_state() -> String {
    crypto::random_token::<24>()
}
