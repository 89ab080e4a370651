use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience claim stamped on every session token.
pub const SESSION_AUDIENCE: &str = "turnstile-web";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Claims carried by both access and refresh tokens.
///
/// `jti` keeps two tokens minted for the same user in the same second distinct, which
/// matters for refresh rotation where the new token must never equal the old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed or its signature is invalid")]
    Malformed,

    #[error("token has the wrong type (expected {expected})")]
    WrongType { expected: &'static str },

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// HS256 signer/verifier built once from the configured secret.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>, access_ttl: i64, refresh_ttl: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue_access_and_refresh(&self, user_id: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue(user_id, TokenType::Access, self.access_ttl)?,
            refresh_token: self.issue(user_id, TokenType::Refresh, self.refresh_ttl)?,
        })
    }

    fn issue(&self, user_id: &str, token_type: TokenType, ttl: i64) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            aud: SESSION_AUDIENCE.to_string(),
            exp: now + ttl,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Verify a token and return its subject (the user id).
    ///
    /// Checks run in a fixed order: signature and structure, then token type, then expiry.
    /// An expired refresh token presented as an access token is therefore `WrongType`.
    pub fn verify_and_decode(&self, token: &str, expected: TokenType) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[SESSION_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                log::debug!("Rejected {} token: {:?}", expected.as_str(), e.kind());
                TokenError::Malformed
            })?
            .claims;

        if claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected: expected.as_str(),
            });
        }

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, "http://localhost:8080", 3600, 2_592_000)
    }

    #[test]
    fn access_and_refresh_round_trip_to_subject() {
        let issuer = issuer();
        let pair = issuer.issue_access_and_refresh("user-1").unwrap();

        assert_eq!(
            issuer.verify_and_decode(&pair.access_token, TokenType::Access).unwrap(),
            "user-1"
        );
        assert_eq!(
            issuer.verify_and_decode(&pair.refresh_token, TokenType::Refresh).unwrap(),
            "user-1"
        );
    }

    #[test]
    fn wrong_type_is_rejected_both_ways() {
        let issuer = issuer();
        let pair = issuer.issue_access_and_refresh("user-1").unwrap();

        assert!(matches!(
            issuer.verify_and_decode(&pair.refresh_token, TokenType::Access),
            Err(TokenError::WrongType { expected: "access" })
        ));
        assert!(matches!(
            issuer.verify_and_decode(&pair.access_token, TokenType::Refresh),
            Err(TokenError::WrongType { expected: "refresh" })
        ));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let issuer = TokenIssuer::new(SECRET, "http://localhost:8080", -10, -10);
        let pair = issuer.issue_access_and_refresh("user-1").unwrap();

        assert!(matches!(
            issuer.verify_and_decode(&pair.access_token, TokenType::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn type_is_checked_before_expiry() {
        let issuer = TokenIssuer::new(SECRET, "http://localhost:8080", -10, -10);
        let pair = issuer.issue_access_and_refresh("user-1").unwrap();

        assert!(matches!(
            issuer.verify_and_decode(&pair.refresh_token, TokenType::Access),
            Err(TokenError::WrongType { .. })
        ));
    }

    #[test]
    fn foreign_secret_and_garbage_are_malformed() {
        let other = TokenIssuer::new(b"another-secret-another-secret-xx", "http://localhost:8080", 3600, 3600);
        let pair = other.issue_access_and_refresh("user-1").unwrap();

        assert!(matches!(
            issuer().verify_and_decode(&pair.access_token, TokenType::Access),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            issuer().verify_and_decode("not.a.jwt", TokenType::Access),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn foreign_issuer_is_malformed() {
        let other = TokenIssuer::new(SECRET, "https://elsewhere.example", 3600, 3600);
        let pair = other.issue_access_and_refresh("user-1").unwrap();

        assert!(matches!(
            issuer().verify_and_decode(&pair.access_token, TokenType::Access),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn consecutive_pairs_differ() {
        let issuer = issuer();
        let a = issuer.issue_access_and_refresh("user-1").unwrap();
        let b = issuer.issue_access_and_refresh("user-1").unwrap();
        assert_ne!(a.refresh_token, b.refresh_token);
        assert_ne!(a.access_token, b.access_token);
    }
}
