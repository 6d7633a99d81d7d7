//! cart-store server entry point.
//!
//! Loads the persisted cart and serves it over REST and WebSocket.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cart_store::api;
use cart_store::app_state::AppState;
use cart_store::config::CartConfig;
use cart_store::domain::EventBus;
use cart_store::persistence;
use cart_store::service::{CartStore, StoreOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = CartConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        addr = %config.listen_addr,
        backend = ?config.storage_backend,
        mode = ?config.persist_mode,
        "starting cart-store"
    );

    // Build persistence and domain layers
    let storage = persistence::connect(&config).await?;
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Build service layer; loads the persisted cart
    let cart = Arc::new(CartStore::open(storage, event_bus, StoreOptions::from(&config)).await);

    // Build router
    let app = api::build_app(AppState::new(Arc::clone(&cart)), config.request_timeout());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tokio::signal::ctrl_c()))
        .await?;

    // Background writes may still be queued
    cart.flush().await;
    tracing::info!("cart flushed; bye");

    Ok(())
}

/// Resolves once `ctrl_c` fires. If the signal handler cannot be installed
/// the server keeps running instead of shutting down at once.
async fn shutdown_signal(ctrl_c: impl Future<Output = std::io::Result<()>>) {
    if let Err(err) = ctrl_c.await {
        tracing::error!(error = %err, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
