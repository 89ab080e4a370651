//! Fixtures shared by the unit tests: an in-memory database and a ready `AppState`.

use std::time::Duration;

use actix_web::web;
use entity::user;
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use turnstile_core::oauth::AuthProvider;
use turnstile_core::token::TokenIssuer;

use crate::app_state::AppState;
use crate::config::SessionWritePolicy;
use crate::cookies::CookiePolicy;
use crate::oauth_client::{tests::mock_client, OAuthClient};
use crate::profiles::ProfileRepository;
use crate::session_store::SessionStore;

pub(crate) const TEST_SECRET: &[u8] = b"test-secret-that-is-at-least-32-bytes-long";
pub(crate) const TEST_BASE_URL: &str = "http://localhost:8080";

const ACCESS_TTL: i64 = 3600;
const REFRESH_TTL: i64 = 2_592_000;

/// Fresh migrated SQLite database. A single connection keeps `:memory:` shared.
pub(crate) async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

/// Migrated SQLite database in a temp file, pooled so that connections really contend.
/// Returns the file path for cleanup.
pub(crate) async fn test_file_db(max_connections: u32) -> (DatabaseConnection, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("turnstile-{}.db", uuid::Uuid::new_v4()));
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options
        .max_connections(max_connections)
        .sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    (db, path)
}

/// State with providers pointed at `oauth_base` (a wiremock server), or none configured.
pub(crate) async fn test_state_inner(oauth_base: Option<&str>) -> AppState {
    let db = test_db().await;

    let oauth = match oauth_base {
        Some(base) => mock_client(base, Duration::from_secs(10)),
        None => OAuthClient::new(TEST_BASE_URL, Duration::from_secs(10)).unwrap(),
    };

    AppState {
        tokens: TokenIssuer::new(TEST_SECRET, TEST_BASE_URL, ACCESS_TTL, REFRESH_TTL),
        sessions: SessionStore::new(db.clone(), REFRESH_TTL, SessionWritePolicy::Strict),
        profiles: ProfileRepository::new(db.clone()),
        oauth,
        cookies: CookiePolicy {
            secure: false,
            access_ttl: ACCESS_TTL,
            refresh_ttl: REFRESH_TTL,
            oauth_state_ttl: 600,
        },
        db,
    }
}

pub(crate) async fn test_state(oauth_base: Option<&str>) -> web::Data<AppState> {
    web::Data::new(test_state_inner(oauth_base).await)
}

pub(crate) async fn seed_user(db: &DatabaseConnection, email: &str) -> user::Model {
    ProfileRepository::new(db.clone())
        .find_or_create_by_email(email, AuthProvider::Email, None)
        .await
        .unwrap()
        .0
}
