//! Outreach - send pipeline entry point

use anyhow::{Context, Result};
use outreach_api::AppState;
use outreach_common::config::{Config, LoggingConfig};
use outreach_core::{
    AiGenerator, BatchOrchestrator, CampaignDriver, DriverSettings, OrchestratorSettings,
    SmtpTransport,
};
use outreach_storage::{db::DatabasePool, DbRecipientStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Outreach send pipeline...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;

    // Run migrations
    db_pool.migrate().await?;

    // Pipeline collaborators, wired explicitly
    let store = Arc::new(DbRecipientStore::new(
        &db_pool,
        Duration::from_secs(config.pipeline.claim_ttl_secs),
    ));
    let transport = Arc::new(SmtpTransport::from_config(&config));
    let generator = Arc::new(AiGenerator::new(&config.ai)?);

    let orchestrator = BatchOrchestrator::new(
        store.clone(),
        store,
        transport,
        generator,
        OrchestratorSettings::from_config(&config.pipeline),
    );
    let driver = CampaignDriver::new(
        orchestrator.clone(),
        DriverSettings::from_config(&config.driver),
    );

    if !config.api.requires_service_token() {
        warn!(
            "api.service_token_hashes is empty: requests are not authenticated and \
             any caller can act as any user through X-User-Id"
        );
    }

    let app = outreach_api::create_router(
        AppState {
            orchestrator,
            driver,
            db_pool: Some(db_pool),
            service_token_hashes: config.api.service_token_hashes.clone(),
        },
        &config.api.cors_origins,
    );

    let addr = format!("{}:{}", config.server.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Outreach shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},outreach=debug", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
