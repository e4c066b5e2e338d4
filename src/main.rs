//! DevFlow - question and tag service

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devflow::{
    api::{self, AppState},
    config::Config,
    db::{
        repositories::{SqlxQuestionRepository, SqlxTagQuestionRepository, SqlxTagRepository},
        ConnectionManager,
    },
    services::{QuestionService, TagService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devflow=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DevFlow...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Connect eagerly so a bad database URL fails at startup; requests reuse
    // the same pool through the manager
    let connections = Arc::new(ConnectionManager::from_config(config.database.clone()));
    connections.acquire().await?;
    tracing::info!("Database ready: {:?}", config.database.driver);

    // Initialize repositories
    let question_repo = SqlxQuestionRepository::boxed(connections.clone());
    let tag_repo = SqlxTagRepository::boxed(connections.clone());
    let link_repo = SqlxTagQuestionRepository::boxed(connections.clone());

    // Initialize services
    let question_service = Arc::new(
        QuestionService::new(connections.clone(), question_repo, tag_repo.clone(), link_repo)
            .with_transaction_timeout(config.database.transaction_timeout()),
    );
    let tag_service = Arc::new(TagService::new(tag_repo));

    // Build application state
    let state = AppState {
        connections: connections.clone(),
        question_service,
        tag_service,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    connections.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
