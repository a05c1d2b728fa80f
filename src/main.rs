mod app;
mod auth;
mod config;
mod error;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "youth_green_jobs=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(
        youth_min_age = config.youth.min,
        youth_max_age = config.youth.max,
        "configuration loaded"
    );

    let (app_state, db) = AppState::init(config).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let config = app_state.config.clone();
    app::serve(&config, app::build_app(app_state)).await
}
