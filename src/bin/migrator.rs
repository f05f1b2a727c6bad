use dotenvy::dotenv;
use stockroom::{
    infrastructure::{config::Config, db, mailer::build_mailer, state::AppState},
    services::users::ensure_bootstrap_admin,
    telemetry,
};
use std::sync::Arc;
use tracing::info;

/// Applies pending migrations and seeds the bootstrap admin, then exits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    telemetry::init();

    let config = Arc::new(Config::from_env()?);
    let pool = db::connect(&config.database).await?;
    db::run_migrations(&pool).await?;
    info!("database migrations completed");

    let mailer = build_mailer(&config.mail)?;
    let state = AppState::new(config, pool, mailer);
    ensure_bootstrap_admin(&state).await?;

    Ok(())
}
