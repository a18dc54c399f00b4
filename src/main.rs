use anyhow::{Context, Result};
use nef::api::{create_router, NefAppState};
use nef::config::{load_config, NefConfig};
use nef::notification::{HttpAfNotifier, NotificationRouter};
use nef::registry::AfRegistry;
use nef::southbound::Southbound;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nef=info,nef_emulator=info,tower_http=info".into()),
        )
        .init();

    info!("NEF emulator starting...");

    let mut config = match std::env::var("NEF_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => NefConfig::default(),
    };
    config.apply_env_overrides();
    config.validate().context("Invalid NEF configuration")?;

    info!(
        bind_address = %config.server.bind_address,
        southbound = ?config.southbound.mode,
        max_af_support = config.nef.max_af_support,
        notification_path = %config.nef.upf_notification_path,
        "Configuration loaded"
    );

    let southbound = Southbound::from_config(&config.southbound);
    let registry = Arc::new(AfRegistry::new(config.nef.clone(), southbound));
    let notifier = Arc::new(HttpAfNotifier::new(Duration::from_secs(
        config.af_client.timeout_secs,
    )));
    let notifications = Arc::new(NotificationRouter::new(registry.clone(), notifier));

    let router = create_router(NefAppState {
        registry,
        notifications,
    });
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!(address = %config.server.bind_address, "NEF API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "NEF API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("NEF emulator stopped");

    Ok(())
}
