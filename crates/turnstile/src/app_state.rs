use sea_orm::DatabaseConnection;
use turnstile_core::token::TokenIssuer;

use crate::cookies::CookiePolicy;
use crate::oauth_client::OAuthClient;
use crate::profiles::ProfileRepository;
use crate::session_store::SessionStore;

/// Shared application state, built once at startup and handed to every handler.
pub struct AppState {
    /// Sea-ORM database connection pool
    pub db: DatabaseConnection,

    /// HS256 signer/verifier for access and refresh tokens
    pub tokens: TokenIssuer,

    pub sessions: SessionStore,

    pub profiles: ProfileRepository,

    /// Configured identity providers
    pub oauth: OAuthClient,

    pub cookies: CookiePolicy,
}
