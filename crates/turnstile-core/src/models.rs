use serde::{Deserialize, Serialize};

pub const LOGIN_PATH: &str = "/login";
pub const ONBOARDING_PATH: &str = "/onboarding";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Where an authenticated user goes next.
pub fn next_url_for(onboarded: bool) -> &'static str {
    if onboarded {
        DASHBOARD_PATH
    } else {
        ONBOARDING_PATH
    }
}

/// Request payload for POST /register
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: String,
    pub onboarded: bool,
}

/// Request payload for POST /login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// Response for a successful login or refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub onboarded: bool,
    pub next_url: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Response for GET /config
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub password_login: bool,
    pub github_oauth: bool,
    pub google_oauth: bool,
}

/// Query string of GET /callback/{provider}
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDetails {
    pub store_name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub contact: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Request payload for POST /onboarding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingPayload {
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub referral_source: Option<String>,
    #[serde(default)]
    pub store: Option<StoreDetails>,
}

impl OnboardingPayload {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.full_name.trim().chars().count() <= 2 {
            return Err("Please enter your full name");
        }

        if self.role == Role::Seller {
            let Some(store) = &self.store else {
                return Err("Sellers must provide store details");
            };
            if store.store_name.trim().chars().count() <= 2 {
                return Err("Please enter a store name");
            }
            if store.contact.trim().chars().count() <= 5 {
                return Err("Please enter a valid store contact");
            }
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OnboardingResponse {
    pub success: bool,
    pub next_url: String,
}

/// Response for GET /me
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub provider: String,
    pub onboarded: bool,
}

/// Response for GET /dashboard
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub user: UserInfo,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_url_follows_onboarding_flag() {
        assert_eq!(next_url_for(false), "/onboarding");
        assert_eq!(next_url_for(true), "/dashboard");
    }

    #[test]
    fn login_payload_deserialization() {
        let json = r#"{"email": "a@example.com", "password": "secret1"}"#;
        let payload: LoginPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.email, "a@example.com");
        assert_eq!(payload.password, "secret1");
    }

    #[test]
    fn callback_query_fields_are_optional() {
        let query: OAuthCallbackQuery = serde_json::from_str(r#"{"error": "access_denied"}"#).unwrap();
        assert!(query.code.is_none());
        assert_eq!(query.error.as_deref(), Some("access_denied"));
    }

    #[test]
    fn buyer_onboarding_needs_only_a_name() {
        let payload: OnboardingPayload =
            serde_json::from_str(r#"{"full_name": "Ada Lovelace", "role": "buyer"}"#).unwrap();
        assert!(payload.validate().is_ok());

        let short: OnboardingPayload = serde_json::from_str(r#"{"full_name": "Al", "role": "buyer"}"#).unwrap();
        assert!(short.validate().is_err());
    }

    #[test]
    fn seller_onboarding_needs_store_details() {
        let missing: OnboardingPayload =
            serde_json::from_str(r#"{"full_name": "Ada Lovelace", "role": "seller"}"#).unwrap();
        assert!(missing.validate().is_err());

        let bad_contact: OnboardingPayload = serde_json::from_str(
            r#"{"full_name": "Ada Lovelace", "role": "seller", "store": {"store_name": "Engines", "contact": "123"}}"#,
        )
        .unwrap();
        assert!(bad_contact.validate().is_err());

        let ok: OnboardingPayload = serde_json::from_str(
            r#"{"full_name": "Ada Lovelace", "role": "seller", "store": {"store_name": "Engines", "contact": "+44 20 7946 0000", "category": "machines"}}"#,
        )
        .unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn error_response_serialization() {
        let response = ErrorResponse {
            error: "invalid_credentials".to_string(),
            message: "Invalid email or password".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("invalid_credentials"));
    }
}
