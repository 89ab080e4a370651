use actix_web::cookie::{time::Duration, Cookie, SameSite};
use turnstile_core::token::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const SESSION_ID_COOKIE: &str = "session_id";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub const OAUTH_VERIFIER_COOKIE: &str = "oauth_verifier";

/// Attributes shared by every cookie Turnstile sets.
///
/// All cookies are HttpOnly, `SameSite=Lax` (the provider redirect back to
/// `/callback/{provider}` is a top-level cross-site navigation and must still carry
/// `oauth_state`) and scoped to `/`.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_ttl: i64,
    pub refresh_ttl: i64,
    pub oauth_state_ttl: i64,
}

impl CookiePolicy {
    fn build(&self, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
        Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(max_age))
            .finish()
    }

    fn expired(&self, name: &'static str) -> Cookie<'static> {
        self.build(name, String::new(), 0)
    }

    pub fn session_cookies(&self, tokens: &TokenPair, session_id: &str) -> [Cookie<'static>; 3] {
        [
            self.build(ACCESS_TOKEN_COOKIE, tokens.access_token.clone(), self.access_ttl),
            self.build(REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone(), self.refresh_ttl),
            self.build(SESSION_ID_COOKIE, session_id.to_string(), self.refresh_ttl),
        ]
    }

    pub fn cleared_session_cookies(&self) -> [Cookie<'static>; 3] {
        [
            self.expired(ACCESS_TOKEN_COOKIE),
            self.expired(REFRESH_TOKEN_COOKIE),
            self.expired(SESSION_ID_COOKIE),
        ]
    }

    pub fn oauth_cookies(&self, state: &str, code_verifier: &str) -> [Cookie<'static>; 2] {
        [
            self.build(OAUTH_STATE_COOKIE, state.to_string(), self.oauth_state_ttl),
            self.build(OAUTH_VERIFIER_COOKIE, code_verifier.to_string(), self.oauth_state_ttl),
        ]
    }

    pub fn cleared_oauth_cookies(&self) -> [Cookie<'static>; 2] {
        [
            self.expired(OAUTH_STATE_COOKIE),
            self.expired(OAUTH_VERIFIER_COOKIE),
        ]
    }
}
