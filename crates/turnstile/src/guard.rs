//! Request authentication and the onboarding gate.
//!
//! A request is evaluated in a fixed order and stops at the first state that applies:
//!
//! 1. `Unauthenticated`: no access token or no session id.
//! 2. `TokenInvalid`: bad signature, malformed, or not an access token.
//! 3. `TokenExpired`
//! 4. `SessionRevoked`: session missing, revoked, expired, or owned by someone else.
//! 5. `NotOnboarded` / `Onboarded`
//!
//! States 1-4 render as 401. `NotOnboarded` is only an error for routes that demand
//! [`OnboardedUser`], and then it is a redirect to `/onboarding`, not a 401.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use entity::user;
use std::future::Future;
use std::pin::Pin;
use turnstile_core::token::{TokenError, TokenType};

use crate::app_state::AppState;
use crate::cookies::{ACCESS_TOKEN_COOKIE, SESSION_ID_COOKIE};
use crate::error::{AuthError, DenyReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Unauthenticated,
    TokenInvalid,
    TokenExpired,
    SessionRevoked,
    NotOnboarded(user::Model),
    Onboarded(user::Model),
}

pub async fn evaluate(
    state: &AppState,
    access_token: Option<&str>,
    session_id: Option<&str>,
) -> Result<GuardState, AuthError> {
    let (Some(access_token), Some(session_id)) = (access_token, session_id) else {
        return Ok(GuardState::Unauthenticated);
    };

    let user_id = match state.tokens.verify_and_decode(access_token, TokenType::Access) {
        Ok(user_id) => user_id,
        Err(TokenError::Expired) => return Ok(GuardState::TokenExpired),
        Err(_) => return Ok(GuardState::TokenInvalid),
    };

    let Some(session) = state.sessions.find_live(session_id).await? else {
        return Ok(GuardState::SessionRevoked);
    };
    if session.user_id != user_id {
        log::warn!("Access token for user {user_id} presented with another user's session");
        return Ok(GuardState::SessionRevoked);
    }

    let Some(user) = state.profiles.find_by_id(&user_id).await? else {
        log::warn!("Valid session for unknown user {user_id}");
        return Ok(GuardState::Unauthenticated);
    };

    Ok(if user.onboarded {
        GuardState::Onboarded(user)
    } else {
        GuardState::NotOnboarded(user)
    })
}

/// Resolve the user behind a request's cookies.
pub async fn authenticate(state: &AppState, req: &HttpRequest) -> Result<user::Model, AuthError> {
    let access_token = req.cookie(ACCESS_TOKEN_COOKIE);
    let session_id = req.cookie(SESSION_ID_COOKIE);

    let outcome = evaluate(
        state,
        access_token.as_ref().map(|c| c.value()),
        session_id.as_ref().map(|c| c.value()),
    )
    .await?;

    match outcome {
        GuardState::Unauthenticated => Err(AuthError::Unauthenticated(DenyReason::MissingCredentials)),
        GuardState::TokenInvalid => Err(AuthError::Unauthenticated(DenyReason::TokenInvalid)),
        GuardState::TokenExpired => Err(AuthError::Unauthenticated(DenyReason::TokenExpired)),
        GuardState::SessionRevoked => Err(AuthError::Unauthenticated(DenyReason::SessionRevoked)),
        GuardState::NotOnboarded(user) | GuardState::Onboarded(user) => Ok(user),
    }
}

pub fn require_onboarded(user: user::Model) -> Result<user::Model, AuthError> {
    if user.onboarded {
        Ok(user)
    } else {
        Err(AuthError::OnboardingRequired)
    }
}

/// Extractor for routes open to any signed-in user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub user::Model);

/// Extractor for routes that also require completed onboarding.
#[derive(Debug, Clone)]
pub struct OnboardedUser(pub user::Model);

type GuardFuture<T> = Pin<Box<dyn Future<Output = Result<T, AuthError>>>>;

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AuthError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AuthError::Internal("application state is not registered".to_string()))
}

impl FromRequest for AuthenticatedUser {
    type Error = AuthError;
    type Future = GuardFuture<Self>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let state = app_state(&req)?;
            authenticate(&state, &req).await.map(AuthenticatedUser)
        })
    }
}

impl FromRequest for OnboardedUser {
    type Error = AuthError;
    type Future = GuardFuture<Self>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let state = app_state(&req)?;
            let user = authenticate(&state, &req).await?;
            require_onboarded(user).map(OnboardedUser)
        })
    }
}
