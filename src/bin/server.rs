use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use chat_hub::auth::TokenManager;
use chat_hub::config::ServerConfig;
use chat_hub::core::hub::{Hub, HubHandle};
use chat_hub::handlers::routes;

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, tls={}",
        config.host, config.port, config.enable_tls
    );

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let (hub, hub_task) = Hub::spawn(&config.hub_config());
    let tokens = Arc::new(TokenManager::new(&config.jwt_secret));
    let routes = routes(hub.clone(), tokens, config.client_config());

    let shutdown = shutdown_signal(hub.clone());

    info!("Starting chat hub on {}", addr);

    if config.enable_tls {
        let (Some(cert_path), Some(key_path)) = (&config.tls_cert_path, &config.tls_key_path) else {
            error!("TLS enabled without certificate and key paths");
            std::process::exit(1);
        };

        let (bound, server) = warp::serve(routes)
            .tls()
            .cert_path(cert_path)
            .key_path(key_path)
            .bind_with_graceful_shutdown(addr, shutdown);
        info!("Listening on wss://{}", bound);
        server.await;
    } else {
        match warp::serve(routes).try_bind_with_graceful_shutdown(addr, shutdown) {
            Ok((bound, server)) => {
                info!("Listening on ws://{}", bound);
                server.await;
            }
            Err(e) => {
                error!("Failed to bind {}: {}", addr, e);
                std::process::exit(1);
            }
        }
    }

    drop(hub);
    if let Err(e) = hub_task.await {
        error!("Hub task failed: {}", e);
    }

    info!("Chat hub stopped");
}

// Resolves once the hub has closed every client, after Ctrl-C
async fn shutdown_signal(hub: HubHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutdown requested, closing all clients");
    if let Err(e) = hub.shutdown().await {
        warn!("Hub shutdown failed: {}", e);
    }
}
