use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reviewer_core::{RandomSource, ReviewService, StdRandom};
use reviewer_server::config::Config;
use reviewer_server::{app, AppState, SqliteRepository};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting reviewer assignment service v{}",
        reviewer_server::get_service_version()
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let db_path = config.database_path();
    info!("Using state database: {}", db_path.display());
    let repository = SqliteRepository::new(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let random: Arc<dyn RandomSource> = match config.assignment_seed {
        Some(seed) => {
            info!("Reviewer selection seeded with {}", seed);
            Arc::new(StdRandom::seeded(seed))
        }
        None => Arc::new(StdRandom::from_entropy()),
    };

    let state = Arc::new(AppState {
        service: Arc::new(ReviewService::new(Arc::new(repository), random)),
    });

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
