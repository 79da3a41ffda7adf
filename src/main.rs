use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use parking_gate_backend::config::{Config, StoreBackend};
use parking_gate_backend::constants::API_NAME;
use parking_gate_backend::repository::{InMemorySessionStore, PgSessionStore, SessionStore};
use parking_gate_backend::service::recognition::INFERENCE_TIMEOUT;
use parking_gate_backend::service::GeminiPlateRecognizer;
use parking_gate_backend::{build_app, state::AppState};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "{} Starting parking gate backend on port {}",
        API_NAME,
        config.server_port
    );

    let sessions: Arc<dyn SessionStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&config.database_url)
                .await
                .context("Failed to connect to database")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("{} Connected to database", API_NAME);
            Arc::new(PgSessionStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("{} Using in-memory session store; data is lost on restart", API_NAME);
            Arc::new(InMemorySessionStore::new())
        }
    };

    if config.gemini_api_key.is_empty() {
        tracing::warn!("{} GEMINI_API_KEY is not set; plate recognition will fail", API_NAME);
    }
    let recognizer = GeminiPlateRecognizer::new(
        config.gemini_api_key.as_str(),
        config.gemini_model.as_str(),
        config.gemini_base_url.as_str(),
        INFERENCE_TIMEOUT,
    )
    .context("Failed to build inference client")?;

    let state = AppState::build(&config, sessions, Arc::new(recognizer))?;
    tracing::info!(
        "{} Camera {}, gate {}, display {}",
        API_NAME,
        config.camera_url,
        config.gate_controller_url,
        config.display_controller_url
    );

    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("{} Server listening on {}", API_NAME, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
