use crate::{
    app_state::AppState,
    config::ServeConfig,
    cookies::CookiePolicy,
    handlers,
    oauth_client::{OAuthClient, ProviderConfig, ProviderEndpoints},
    profiles::ProfileRepository,
    session_store::SessionStore,
};
use actix_web::{middleware, web, App, HttpServer};
use migration::MigratorTrait;
use sea_orm::Database;
use std::time::Duration;
use turnstile_core::oauth::AuthProvider;
use turnstile_core::token::TokenIssuer;

fn oauth_client(config: &ServeConfig) -> anyhow::Result<OAuthClient> {
    let mut client = OAuthClient::new(
        config.base_url.clone(),
        Duration::from_secs(config.oauth_timeout_secs),
    )?;

    let credentials = [
        (
            AuthProvider::Github,
            &config.github_client_id,
            &config.github_client_secret,
        ),
        (
            AuthProvider::Google,
            &config.google_client_id,
            &config.google_client_secret,
        ),
    ];

    for (provider, id, secret) in credentials {
        let (Some(client_id), Some(client_secret), Some(endpoints)) =
            (id, secret, ProviderEndpoints::for_provider(provider))
        else {
            continue;
        };

        log::info!("{provider} login enabled");
        client = client.with_provider(
            provider,
            ProviderConfig {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                endpoints,
            },
        );
    }

    Ok(client)
}

/// Connect, migrate, and wire every component from the serve configuration.
pub async fn build_app_state(config: &ServeConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    log::info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url).await?;

    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;
    log::info!("Database migrations completed");

    let cookies = CookiePolicy {
        secure: config.cookie_secure(),
        access_ttl: config.access_token_ttl,
        refresh_ttl: config.refresh_token_ttl,
        oauth_state_ttl: config.oauth_state_ttl,
    };
    if !cookies.secure {
        log::warn!("Cookies are issued without the Secure flag (local development base URL)");
    }

    Ok(AppState {
        tokens: TokenIssuer::new(
            config.jwt_secret.as_bytes(),
            &config.base_url,
            config.access_token_ttl,
            config.refresh_token_ttl,
        ),
        sessions: SessionStore::new(
            db.clone(),
            config.refresh_token_ttl,
            config.session_write_policy,
        ),
        profiles: ProfileRepository::new(db.clone()),
        oauth: oauth_client(config)?,
        cookies,
        db,
    })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/config", web::get().to(handlers::get_config))
        .route("/login/{provider}", web::get().to(handlers::login_start))
        .route("/callback/{provider}", web::get().to(handlers::oauth_callback))
        .route("/register", web::post().to(handlers::auth::register))
        .route("/login", web::post().to(handlers::auth::login))
        .route("/refresh", web::post().to(handlers::auth::refresh))
        .route("/logout", web::get().to(handlers::auth::logout))
        .route("/me", web::get().to(handlers::user::me))
        .route("/onboarding", web::get().to(handlers::user::onboarding_status))
        .route("/onboarding", web::post().to(handlers::user::submit_onboarding))
        .route("/dashboard", web::get().to(handlers::user::dashboard));
}

pub async fn run_server(config: ServeConfig) -> anyhow::Result<()> {
    log::info!("Starting Turnstile authentication server...");

    let app_state = web::Data::new(build_app_state(&config).await?);
    let bind_address = config.bind_address.clone();

    log::info!("Listening on {bind_address} (public URL {})", config.base_url);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
