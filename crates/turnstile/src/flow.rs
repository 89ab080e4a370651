//! Login, registration, refresh and logout, independent of HTTP plumbing.
//!
//! Handlers in [`crate::handlers`] read cookies and bodies, call into here, and turn the
//! result into redirects, cookies and JSON.

use entity::user;
use turnstile_core::credentials::{self, normalize_email};
use turnstile_core::crypto;
use turnstile_core::models::{next_url_for, LoginPayload, OAuthCallbackQuery, OnboardingPayload, RegisterPayload};
use turnstile_core::oauth::AuthProvider;
use turnstile_core::password;
use turnstile_core::token::{TokenPair, TokenType};

use crate::app_state::AppState;
use crate::error::{AuthError, DenyReason};
use crate::oauth_client::AuthorizationRequest;
use crate::session_store::ClientInfo;

/// A freshly minted token pair and the session it is bound to.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: user::Model,
    pub tokens: TokenPair,
    pub session_id: String,
}

impl IssuedSession {
    pub fn next_url(&self) -> &'static str {
        next_url_for(self.user.onboarded)
    }
}

fn delegated_provider(raw: &str) -> Result<AuthProvider, AuthError> {
    match raw.parse::<AuthProvider>() {
        Ok(provider) if provider.is_delegated() => Ok(provider),
        _ => Err(AuthError::UnknownProvider(raw.to_string())),
    }
}

async fn start_session(
    state: &AppState,
    user: user::Model,
    client: &ClientInfo,
) -> Result<IssuedSession, AuthError> {
    let tokens = state.tokens.issue_access_and_refresh(&user.id)?;
    let session_id = state
        .sessions
        .create_session(&user.id, &tokens.refresh_token, client)
        .await?;

    Ok(IssuedSession {
        user,
        tokens,
        session_id,
    })
}

/// Step one of delegated login: PKCE material and the provider URL.
pub fn begin_login(state: &AppState, provider: &str) -> Result<AuthorizationRequest, AuthError> {
    let provider = delegated_provider(provider)?;
    let request = state.oauth.build_authorization_url(provider)?;
    log::info!("Starting {provider} login");
    Ok(request)
}

/// Step two of delegated login.
///
/// `stored_state` and `code_verifier` come from the cookies set by [`begin_login`]. The
/// state check happens before any network call; a mismatch never reaches the provider.
pub async fn complete_callback(
    state: &AppState,
    provider: &str,
    query: &OAuthCallbackQuery,
    stored_state: Option<&str>,
    code_verifier: Option<&str>,
    client: &ClientInfo,
) -> Result<IssuedSession, AuthError> {
    let provider = delegated_provider(provider)?;

    if let Some(error) = &query.error {
        log::warn!(
            "{provider} returned error '{error}': {}",
            query.error_description.as_deref().unwrap_or("")
        );
        return Err(AuthError::ProviderDenied {
            error: error.clone(),
            description: query.error_description.clone(),
        });
    }

    let (Some(expected), Some(returned), Some(code_verifier)) =
        (stored_state, query.state.as_deref(), code_verifier)
    else {
        log::warn!("{provider} callback without OAuth state or verifier cookie");
        return Err(AuthError::CsrfMismatch);
    };
    if !crypto::constant_time_eq(expected, returned) {
        log::warn!("{provider} callback state did not match the stored state");
        return Err(AuthError::CsrfMismatch);
    }

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCode)?;

    let redirect_uri = state.oauth.redirect_uri(provider);
    let outcome = state
        .oauth
        .exchange_code(provider, code, code_verifier, &redirect_uri)
        .await?;

    let (user, created) = state
        .profiles
        .find_or_create_by_email(&outcome.user.email, provider, None)
        .await?;

    log::info!(
        "{provider} login for {} (provider_user_id={}, new_account={created})",
        user.email,
        outcome.user.provider_user_id
    );

    start_session(state, user, client).await
}

/// Create a password account. Does not sign the user in.
pub async fn register(state: &AppState, payload: &RegisterPayload) -> Result<user::Model, AuthError> {
    credentials::validate_email(&payload.email).map_err(|m| AuthError::InvalidInput(m.to_string()))?;
    credentials::validate_password(&payload.password)
        .map_err(|m| AuthError::InvalidInput(m.to_string()))?;

    let email = normalize_email(&payload.email);
    if state.profiles.find_by_email(&email).await?.is_some() {
        log::info!("Registration refused for {email}: already exists");
        return Err(AuthError::DuplicateUser);
    }

    let password_hash = password::hash_password(&payload.password)?;
    let (user, created) = state
        .profiles
        .find_or_create_by_email(&email, AuthProvider::Email, Some(password_hash))
        .await?;

    if !created {
        return Err(AuthError::DuplicateUser);
    }
    Ok(user)
}

/// Password login. Every failure is the same `InvalidCredentials`.
pub async fn login(
    state: &AppState,
    payload: &LoginPayload,
    client: &ClientInfo,
) -> Result<IssuedSession, AuthError> {
    let email = normalize_email(&payload.email);

    let account = state.profiles.find_by_email(&email).await?.and_then(|user| {
        let hash = user.password_hash.clone()?;
        Some((user, hash))
    });

    let Some((user, hash)) = account else {
        password::verify_against_dummy(&payload.password);
        log::info!("Login failed for {email}: no password account");
        return Err(AuthError::InvalidCredentials);
    };

    if !password::verify_password(&payload.password, &hash) {
        log::info!("Login failed for {email}: wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    log::info!("Password login for {email}");
    start_session(state, user, client).await
}

/// Trade a refresh token and its session for a new pair and a new session.
///
/// The session must be live, belong to the token's subject, and be bound to exactly
/// this refresh token. The old session is revoked as part of the rotation, so
/// presenting the old pair again yields `SessionRevoked`.
pub async fn refresh(
    state: &AppState,
    refresh_token: Option<&str>,
    session_id: Option<&str>,
    client: &ClientInfo,
) -> Result<IssuedSession, AuthError> {
    let (Some(refresh_token), Some(session_id)) = (refresh_token, session_id) else {
        return Err(AuthError::Unauthenticated(DenyReason::MissingCredentials));
    };

    let user_id = state
        .tokens
        .verify_and_decode(refresh_token, TokenType::Refresh)?;

    let session = state
        .sessions
        .find_live(session_id)
        .await?
        .ok_or(AuthError::SessionRevoked)?;

    if session.user_id != user_id
        || !crypto::constant_time_eq(&session.refresh_token, &crypto::sha256_hex(refresh_token))
    {
        log::warn!("Refresh token for user {user_id} does not belong to the presented session");
        return Err(AuthError::SessionRevoked);
    }

    let user = state
        .profiles
        .find_by_id(&user_id)
        .await?
        .ok_or(AuthError::SessionRevoked)?;

    let tokens = state.tokens.issue_access_and_refresh(&user.id)?;
    let new_session_id = state
        .sessions
        .rotate_session(session_id, &user.id, &tokens.refresh_token, client)
        .await?;

    Ok(IssuedSession {
        user,
        tokens,
        session_id: new_session_id,
    })
}

/// Revoke the session if there is one. Storage failures are logged, never returned:
/// the caller clears cookies regardless.
pub async fn logout(state: &AppState, session_id: Option<&str>) {
    let Some(session_id) = session_id else {
        return;
    };

    if let Err(e) = state.sessions.revoke(session_id).await {
        log::error!("Failed to revoke session during logout: {e}");
    }
}

pub async fn complete_onboarding(
    state: &AppState,
    user: &user::Model,
    payload: &OnboardingPayload,
) -> Result<(), AuthError> {
    payload
        .validate()
        .map_err(|m| AuthError::InvalidInput(m.to_string()))?;

    state.profiles.mark_onboarded(&user.id, payload).await
}
