use clap::Parser;
use migration::MigratorTrait;
use sea_orm::Database;
use turnstile_lib::{
    config::{Command, Config},
    profiles::ProfileRepository,
    server::run_server,
    session_store::SessionStore,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let config = Config::parse();

    // Initialize logger based on command
    let log_level = match &config.command {
        Command::Serve(serve_config) => serve_config.log_level.as_str(),
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match config.command {
        Command::Serve(serve_config) => {
            run_server(serve_config).await?;
        }
        Command::Migrate { database_url } => {
            run_migrations(&database_url).await?;
        }
        Command::ListUsers { database_url } => {
            list_users(&database_url).await?;
        }
        Command::RevokeSessions {
            database_url,
            email,
        } => {
            revoke_sessions(&database_url, &email).await?;
        }
    }

    Ok(())
}

async fn run_migrations(database_url: &str) -> anyhow::Result<()> {
    log::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;

    println!("✅ Database migrations completed successfully!");

    Ok(())
}

async fn list_users(database_url: &str) -> anyhow::Result<()> {
    let db = Database::connect(database_url).await?;
    let users = ProfileRepository::new(db).list_users().await?;

    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!("{:<38} {:<32} {:<8} {:<10}", "ID", "Email", "Provider", "Onboarded");
    println!("{}", "-".repeat(92));
    for user in &users {
        println!(
            "{:<38} {:<32} {:<8} {:<10}",
            user.id,
            user.email,
            user.provider,
            if user.onboarded { "yes" } else { "no" }
        );
    }
    println!("\nTotal: {} user(s)", users.len());

    Ok(())
}

async fn revoke_sessions(database_url: &str, email: &str) -> anyhow::Result<()> {
    let db = Database::connect(database_url).await?;

    let Some(user) = ProfileRepository::new(db.clone()).find_by_email(email).await? else {
        anyhow::bail!("No user with email '{email}'");
    };

    // Write policy and TTL are irrelevant for revocation.
    let sessions = SessionStore::new(db, 0, turnstile_lib::config::SessionWritePolicy::Strict);
    let revoked = sessions.revoke_all_for_user(&user.id).await?;

    println!("✅ Revoked {revoked} session(s) for {}", user.email);

    Ok(())
}
