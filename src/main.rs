mod config;
mod docs;
mod error;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod store;
mod websocket;

use config::{Config, StoreBackend};
use models::SeedData;
use routes::create_app;
use state::AppState;
use std::panic;
use std::sync::Arc;
use store::{KeySpace, MemoryStore, RedisStore, Store};
use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration before tracing so the configured level applies
    let config_result = Config::load();
    let config = config_result.as_ref().cloned().unwrap_or_default();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into()))
        .init();

    info!("Starting server...");
    match &config_result {
        Ok(_) => info!("✅ Configuration loaded successfully"),
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            warn!("Using default configuration");
        }
    }

    // Seed data for rooms that are used for the first time
    let seed = match SeedData::load(config.seed_file.as_deref()) {
        Ok(seed) => seed,
        Err(e) => {
            error!("Failed to load seed data: {}", e);
            warn!("Using built-in seed data");
            SeedData::default()
        }
    };

    let store = connect_store(&config).await;
    let state = AppState::new(store, KeySpace::new(config.store_prefix.clone()), seed);
    let app_routes = create_app(state, config.cors_origin_list());

    // Start the HTTP/WebSocket server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/project/{{roomId}}/karte?userId={{userId}}", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}

/// Connect to the configured store, falling back to the in-process store
async fn connect_store(config: &Config) -> Arc<dyn Store> {
    let backend = config.store_backend().unwrap_or_else(|e| {
        error!("{}", e);
        warn!("Falling back to the redis store backend");
        StoreBackend::Redis
    });

    match backend {
        StoreBackend::Memory => {
            info!("Using in-process store, room state is local to this node");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Redis => match RedisStore::connect(&config.redis_url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to connect to Redis at {}: {}", config.redis_url, e);
                warn!("Room state will not be shared across nodes - using in-process store");
                Arc::new(MemoryStore::new())
            }
        },
    }
}
