use reqwest::header;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use turnstile_core::oauth::{self, AuthProvider, OAuthTokenParseError, ProviderTokens, RemoteUser};
use turnstile_core::pkce::{self, PkceChallenge};
use url::Url;

use crate::error::AuthError;

#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// GitHub only: consulted when `/user` hides the address.
    pub emails_url: Option<String>,
    pub scope: String,
}

impl ProviderEndpoints {
    pub fn google() -> Self {
        Self {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".into(),
            emails_url: None,
            scope: "openid email profile".into(),
        }
    }

    pub fn github() -> Self {
        Self {
            authorize_url: "https://github.com/login/oauth/authorize".into(),
            token_url: "https://github.com/login/oauth/access_token".into(),
            userinfo_url: "https://api.github.com/user".into(),
            emails_url: Some("https://api.github.com/user/emails".into()),
            scope: "read:user user:email".into(),
        }
    }

    pub fn for_provider(provider: AuthProvider) -> Option<Self> {
        match provider {
            AuthProvider::Google => Some(Self::google()),
            AuthProvider::Github => Some(Self::github()),
            AuthProvider::Email => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub endpoints: ProviderEndpoints,
}

/// Everything `GET /login/{provider}` needs: where to send the browser and what to
/// remember until the callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub code_verifier: String,
    pub state: String,
}

#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub tokens: ProviderTokens,
    pub user: RemoteUser,
}

/// Authorization-code + PKCE client for the configured identity providers.
///
/// Every request carries the client-wide timeout and is attempted exactly once.
pub struct OAuthClient {
    http: reqwest::Client,
    redirect_base: String,
    providers: HashMap<AuthProvider, ProviderConfig>,
}

impl OAuthClient {
    pub fn new(redirect_base: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("turnstile/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            redirect_base: redirect_base.into().trim_end_matches('/').to_string(),
            providers: HashMap::new(),
        })
    }

    pub fn with_provider(mut self, provider: AuthProvider, config: ProviderConfig) -> Self {
        self.providers.insert(provider, config);
        self
    }

    pub fn is_configured(&self, provider: AuthProvider) -> bool {
        self.providers.contains_key(&provider)
    }

    pub fn redirect_uri(&self, provider: AuthProvider) -> String {
        format!("{}/callback/{}", self.redirect_base, provider)
    }

    fn provider(&self, provider: AuthProvider) -> Result<&ProviderConfig, AuthError> {
        self.providers
            .get(&provider)
            .ok_or(AuthError::ProviderNotConfigured(provider))
    }

    pub fn build_authorization_url(
        &self,
        provider: AuthProvider,
    ) -> Result<AuthorizationRequest, AuthError> {
        let config = self.provider(provider)?;
        let pkce = PkceChallenge::generate();

        let mut url = Url::parse(&config.endpoints.authorize_url).map_err(|e| {
            AuthError::Internal(format!("invalid authorize URL for {provider}: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &self.redirect_uri(provider))
            .append_pair("response_type", "code")
            .append_pair("scope", &config.endpoints.scope)
            .append_pair("state", &pkce.state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);

        Ok(AuthorizationRequest {
            url: url.into(),
            code_verifier: pkce.code_verifier,
            state: pkce.state,
        })
    }

    /// Trade an authorization code for provider tokens and the identity behind them.
    pub async fn exchange_code(
        &self,
        provider: AuthProvider,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<ExchangeOutcome, AuthError> {
        let config = self.provider(provider)?;

        let response = self
            .http
            .post(&config.endpoints.token_url)
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            log::warn!(
                "{provider} token exchange failed ({status}): {}",
                oauth::redact_token_body_for_log(&body)
            );
            return Err(AuthError::ExchangeFailed(format!(
                "token endpoint answered {status}"
            )));
        }

        let tokens = oauth::parse_token_exchange_body(&body).map_err(|e| {
            if !matches!(e, OAuthTokenParseError::ProviderError(_)) {
                log::warn!(
                    "{provider} token response unusable: {}",
                    oauth::redact_token_body_for_log(&body)
                );
            }
            AuthError::ExchangeFailed(e.to_string())
        })?;

        let user = self.fetch_remote_user(provider, config, &tokens.access_token).await?;

        Ok(ExchangeOutcome { tokens, user })
    }

    async fn fetch_remote_user(
        &self,
        provider: AuthProvider,
        config: &ProviderConfig,
        access_token: &str,
    ) -> Result<RemoteUser, AuthError> {
        let profile = self.get_json(&config.endpoints.userinfo_url, access_token).await?;

        let remote = match provider {
            AuthProvider::Github => {
                let has_email = profile
                    .get("email")
                    .and_then(Value::as_str)
                    .is_some_and(|e| !e.is_empty());

                let fallback = match (&config.endpoints.emails_url, has_email) {
                    (Some(emails_url), false) => {
                        let emails = self.get_json(emails_url, access_token).await?;
                        oauth::pick_github_primary_email(&emails)
                    }
                    _ => None,
                };

                oauth::parse_github_user(&profile, fallback)
            }
            AuthProvider::Google => oauth::parse_google_userinfo(&profile),
            AuthProvider::Email => None,
        };

        remote.ok_or_else(|| {
            AuthError::ExchangeFailed(format!("{provider} did not return a verified email address"))
        })
    }

    async fn get_json(&self, url: &str, access_token: &str) -> Result<Value, AuthError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::ExchangeFailed(format!(
                "user info request answered {status}"
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                AuthError::Timeout
            } else {
                AuthError::ExchangeFailed(format!("user info response was not JSON: {e}"))
            }
        })
    }
}

fn transport_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::NetworkError(e.without_url().to_string())
    }
}
