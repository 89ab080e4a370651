use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// How an account signs in. Stored verbatim in `users.provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Email,
    Google,
    Github,
}

impl AuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthProvider::Email => "email",
            AuthProvider::Google => "google",
            AuthProvider::Github => "github",
        }
    }

    /// Whether this provider signs in through a third-party redirect.
    pub fn is_delegated(self) -> bool {
        !matches!(self, AuthProvider::Email)
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl FromStr for AuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(AuthProvider::Email),
            "google" => Ok(AuthProvider::Google),
            "github" => Ok(AuthProvider::Github),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthErrorFields {
    pub error: String,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

impl fmt::Display for OAuthErrorFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.error)?;
        if let Some(desc) = self.error_description.as_deref().filter(|d| !d.is_empty()) {
            write!(f, ": {desc}")?;
        }
        if let Some(uri) = self.error_uri.as_deref().filter(|u| !u.is_empty()) {
            write!(f, " ({uri})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthTokenParseError {
    /// The provider returned an explicit error payload (GitHub does this with HTTP 200).
    #[error("token exchange returned error {0}")]
    ProviderError(OAuthErrorFields),

    #[error("token exchange response missing access_token")]
    MissingAccessToken,

    #[error("token exchange response had an unrecognized format")]
    InvalidFormat,
}

/// Tokens handed back by the provider's token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Parse a token-endpoint response body.
///
/// Supports JSON (preferred) and `application/x-www-form-urlencoded` bodies. Errors never
/// carry the raw body so tokens cannot leak into logs through them.
pub fn parse_token_exchange_body(body: &str) -> Result<ProviderTokens, OAuthTokenParseError> {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        let field = |name: &str| v.get(name).and_then(Value::as_str).map(str::to_string);

        if let Some(access_token) = field("access_token") {
            return Ok(ProviderTokens {
                access_token,
                refresh_token: field("refresh_token"),
            });
        }

        if let Some(error) = field("error") {
            return Err(OAuthTokenParseError::ProviderError(OAuthErrorFields {
                error,
                error_description: field("error_description"),
                error_uri: field("error_uri"),
            }));
        }

        return Err(OAuthTokenParseError::MissingAccessToken);
    }

    if !body.contains('=') {
        return Err(OAuthTokenParseError::InvalidFormat);
    }

    let mut access_token = None;
    let mut refresh_token = None;
    let mut error = None;
    let mut error_description = None;
    let mut error_uri = None;

    for (k, v) in url::form_urlencoded::parse(body.as_bytes()).into_owned() {
        match k.as_str() {
            "access_token" => access_token = Some(v),
            "refresh_token" => refresh_token = Some(v),
            "error" => error = Some(v),
            "error_description" => error_description = Some(v),
            "error_uri" => error_uri = Some(v),
            _ => {}
        }
    }

    if let Some(access_token) = access_token {
        return Ok(ProviderTokens {
            access_token,
            refresh_token,
        });
    }

    match error {
        Some(error) => Err(OAuthTokenParseError::ProviderError(OAuthErrorFields {
            error,
            error_description,
            error_uri,
        })),
        None => Err(OAuthTokenParseError::MissingAccessToken),
    }
}

/// The identity a provider vouches for after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub provider_user_id: String,
    pub email: String,
    pub name: Option<String>,
}

/// Google OpenID Connect userinfo. Unverified addresses are refused.
pub fn parse_google_userinfo(v: &Value) -> Option<RemoteUser> {
    let email = v.get("email")?.as_str()?;
    if v.get("email_verified").and_then(Value::as_bool) == Some(false) {
        return None;
    }

    Some(RemoteUser {
        provider_user_id: v.get("sub")?.as_str()?.to_string(),
        email: email.to_string(),
        name: v.get("name").and_then(Value::as_str).map(str::to_string),
    })
}

/// GitHub `/user`. `email` is null when the user keeps it private; callers then consult
/// `/user/emails` and pass the result as `fallback_email`.
pub fn parse_github_user(v: &Value, fallback_email: Option<String>) -> Option<RemoteUser> {
    let id = v.get("id")?.as_i64()?;
    let email = v
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .or(fallback_email)?;

    let name = v
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| v.get("login").and_then(Value::as_str))
        .map(str::to_string);

    Some(RemoteUser {
        provider_user_id: id.to_string(),
        email,
        name,
    })
}

/// Pick the primary, verified address out of GitHub's `/user/emails` listing.
pub fn pick_github_primary_email(v: &Value) -> Option<String> {
    v.as_array()?
        .iter()
        .find(|e| {
            e.get("primary").and_then(Value::as_bool) == Some(true)
                && e.get("verified").and_then(Value::as_bool) == Some(true)
        })
        .and_then(|e| e.get("email"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    // Slice on a UTF-8 boundary.
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}…(truncated)", &s[..end])
}

/// Render a token-endpoint body for an error log with any tokens replaced.
pub fn redact_token_body_for_log(body: &str) -> String {
    if let Ok(mut v) = serde_json::from_str::<Value>(body) {
        for key in ["access_token", "refresh_token", "id_token"] {
            if v.get(key).is_some() {
                v[key] = json!("[REDACTED]");
            }
        }
        return truncate_for_log(&v.to_string(), 2048);
    }

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    if body.contains('=') && !pairs.is_empty() {
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            if k.ends_with("_token") {
                ser.append_pair(&k, "[REDACTED]");
            } else {
                ser.append_pair(&k, &v);
            }
        }
        return truncate_for_log(&ser.finish(), 2048);
    }

    if body.contains("_token") {
        return "<redacted token response>".to_string();
    }

    truncate_for_log(body, 2048)
}
