use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use lunchvote_rs::{
    config::StorageBackend,
    create_app, init_observability,
    services::{default_restaurants, SystemClock},
    shutdown_observability, AppComponents, Config, HttpLimits, Metrics,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_environment()?;

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint.as_deref().unwrap_or_default(),
        &config.observability.log_level,
        config.observability.enable_json_logging,
    )?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );

    let metrics = Arc::new(Metrics::new()?);
    let components =
        AppComponents::from_config(&config, Arc::new(SystemClock), metrics.clone()).await;

    // An in-memory store starts empty; give it the sample restaurants and today's menu
    if config.database.storage_backend == StorageBackend::Memory {
        match components
            .restaurant_service
            .seed(default_restaurants())
            .await
        {
            Ok(created) => info!("Seeded {} sample restaurants", created.len()),
            Err(e) => warn!("Failed to seed sample restaurants: {}", e),
        }
        match components.restaurant_service.list_restaurants().await {
            Ok(restaurants) => match components.menu_service.seed_today(&restaurants).await {
                Ok(created) => info!("Published {} sample dishes", created.len()),
                Err(e) => warn!("Failed to publish sample menu: {}", e),
            },
            Err(e) => warn!("Failed to list restaurants for the sample menu: {}", e),
        }
    }

    let app = create_app(
        components,
        HttpLimits {
            request_timeout: config.server.request_timeout(),
            max_request_size: config.server.max_request_size,
        },
    );

    let listener = TcpListener::bind(config.server.bind_address()).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    shutdown_observability().await;
}
