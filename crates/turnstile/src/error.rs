use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use turnstile_core::models::{ErrorResponse, LOGIN_PATH, ONBOARDING_PATH};
use turnstile_core::oauth::AuthProvider;
use turnstile_core::password::PasswordError;
use turnstile_core::token::TokenError;

/// Why the guard refused a request. Every variant renders as 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingCredentials,
    TokenInvalid,
    TokenExpired,
    SessionRevoked,
}

impl DenyReason {
    pub fn code(self) -> &'static str {
        match self {
            DenyReason::MissingCredentials => "unauthenticated",
            DenyReason::TokenInvalid => "token_invalid",
            DenyReason::TokenExpired => "token_expired",
            DenyReason::SessionRevoked => "session_revoked",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    DuplicateUser,

    #[error("{0}")]
    InvalidInput(String),

    #[error("OAuth state did not match")]
    CsrfMismatch,

    #[error("authorization code missing from callback")]
    MissingCode,

    #[error("identity provider returned '{error}'")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("provider '{0}' is not configured")]
    ProviderNotConfigured(AuthProvider),

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("identity provider did not answer in time")]
    Timeout,

    #[error("could not reach identity provider: {0}")]
    NetworkError(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("token is malformed")]
    TokenMalformed,

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("not authenticated ({})", .0.code())]
    Unauthenticated(DenyReason),

    #[error("onboarding must be completed first")]
    OnboardingRequired,

    #[error("onboarding has already been completed")]
    AlreadyOnboarded,

    #[error("user not found")]
    UserNotFound,

    #[error("storage error: {0}")]
    Storage(#[from] DbErr),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable snake_case identifier used in JSON bodies and `/login?error=` redirects.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::DuplicateUser => "duplicate_user",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::CsrfMismatch => "csrf_mismatch",
            AuthError::MissingCode => "no_code",
            AuthError::ProviderDenied { .. } => "provider_denied",
            AuthError::UnknownProvider(_) => "unknown_provider",
            AuthError::ProviderNotConfigured(_) => "provider_not_configured",
            AuthError::ExchangeFailed(_) => "exchange_failed",
            AuthError::Timeout => "timeout",
            AuthError::NetworkError(_) => "network_error",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenMalformed => "token_malformed",
            AuthError::SessionRevoked => "session_revoked",
            AuthError::Unauthenticated(reason) => reason.code(),
            AuthError::OnboardingRequired => "onboarding_required",
            AuthError::AlreadyOnboarded => "already_onboarded",
            AuthError::UserNotFound => "user_not_found",
            AuthError::Storage(_) => "storage_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Where the browser lands when a redirect-based flow fails.
    pub fn login_redirect(&self) -> String {
        let error = match self {
            AuthError::ProviderDenied { error, .. } => error.as_str(),
            other => other.code(),
        };

        let mut location = format!("{LOGIN_PATH}?error={}", urlencoding::encode(error));
        if let AuthError::ProviderDenied {
            description: Some(description),
            ..
        } = self
        {
            location.push_str("&msg=");
            location.push_str(&urlencoding::encode(description));
        }
        location
    }

    fn public_message(&self) -> String {
        match self {
            AuthError::Storage(_) | AuthError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Malformed | TokenError::WrongType { .. } => AuthError::TokenMalformed,
            TokenError::Signing(e) => AuthError::Internal(format!("token signing failed: {e}")),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::TokenMalformed
            | AuthError::SessionRevoked
            | AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AuthError::DuplicateUser
            | AuthError::InvalidInput(_)
            | AuthError::CsrfMismatch
            | AuthError::MissingCode
            | AuthError::ProviderDenied { .. }
            | AuthError::ProviderNotConfigured(_) => StatusCode::BAD_REQUEST,
            AuthError::UnknownProvider(_) | AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::AlreadyOnboarded => StatusCode::CONFLICT,
            AuthError::OnboardingRequired => StatusCode::TEMPORARY_REDIRECT,
            AuthError::ExchangeFailed(_) | AuthError::NetworkError(_) => StatusCode::BAD_GATEWAY,
            AuthError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AuthError::Storage(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("Request failed: {self}");
        }

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.public_message(),
        };

        let mut response = HttpResponse::build(self.status_code());
        if matches!(self, AuthError::OnboardingRequired) {
            response.insert_header((header::LOCATION, ONBOARDING_PATH));
        }
        response.json(body)
    }
}
