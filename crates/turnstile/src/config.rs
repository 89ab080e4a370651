use clap::{Parser, ValueEnum};

const DEFAULT_DATABASE_URL: &str = "sqlite://./turnstile.db?mode=rwc";

/// Shortest accepted HS256 secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Parser)]
#[command(name = "turnstile")]
#[command(about = "Turnstile Authentication Server", long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Start the authentication server
    Serve(ServeConfig),

    /// Run database migrations
    Migrate {
        /// Database connection URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },

    /// List all users
    ListUsers {
        /// Database connection URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },

    /// Revoke every live session of a user (forces a fresh login everywhere)
    RevokeSessions {
        /// Database connection URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,

        /// Email of the account
        #[arg(short, long)]
        email: String,
    },
}

/// What `create_session` does when the insert fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SessionWritePolicy {
    /// Abort the login with a storage error.
    Strict,
    /// Log the failure and hand out the generated id anyway.
    Degraded,
}

#[derive(Debug, Clone, Parser)]
pub struct ServeConfig {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Server bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// Public base URL of this server (e.g., https://auth.example.com).
    /// Used for OAuth redirect URIs, the JWT issuer claim and the cookie `Secure` flag.
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Shared HS256 secret for access and refresh tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = 3600)]
    pub access_token_ttl: i64,

    /// Refresh token and session lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = 2_592_000)]
    pub refresh_token_ttl: i64,

    /// Lifetime of the OAuth state/verifier cookies in seconds
    #[arg(long, env = "OAUTH_STATE_TTL", default_value_t = 600)]
    pub oauth_state_ttl: i64,

    /// Timeout for every request to an identity provider, in seconds
    #[arg(long, env = "OAUTH_TIMEOUT_SECS", default_value_t = 10)]
    pub oauth_timeout_secs: u64,

    /// Behaviour when a new session cannot be written
    #[arg(long, env = "SESSION_WRITE_POLICY", value_enum, default_value_t = SessionWritePolicy::Strict)]
    pub session_write_policy: SessionWritePolicy,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// GitHub OAuth Client ID
    #[arg(long, env = "GITHUB_CLIENT_ID")]
    pub github_client_id: Option<String>,

    /// GitHub OAuth Client Secret
    #[arg(long, env = "GITHUB_CLIENT_SECRET", hide_env_values = true)]
    pub github_client_secret: Option<String>,

    /// Google OAuth Client ID
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google OAuth Client Secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,
}

impl ServeConfig {
    /// Cookies carry `Secure` everywhere except plain-http local development.
    pub fn cookie_secure(&self) -> bool {
        let Ok(url) = url::Url::parse(&self.base_url) else {
            return true;
        };

        let local = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
        !(local && url.scheme() == "http")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("BASE_URL is not a valid URL: {e}"))?;

        if self.access_token_ttl <= 0 || self.refresh_token_ttl <= 0 || self.oauth_state_ttl <= 0 {
            anyhow::bail!("token and state lifetimes must be positive");
        }

        if self.github_client_id.is_some() != self.github_client_secret.is_some() {
            log::warn!("GitHub login needs both GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET; disabling it");
        }
        if self.google_client_id.is_some() != self.google_client_secret.is_some() {
            log::warn!("Google login needs both GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET; disabling it");
        }

        Ok(())
    }
}
