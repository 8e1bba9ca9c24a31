//! Job Board API Server Entry Point
//!
//! Bootstraps configuration, opens storage and the cache store, starts the
//! background workers and serves the Axum router until ctrl-c.

use std::sync::Arc;

use jobboard_api::{
    create_api_router,
    jobs::{cache_maintenance_task, CacheMaintenanceConfig},
    telemetry::{init_tracing, TelemetryConfig},
    ApiConfig, ApiError, ApiResult, AppState, CacheBackendConfig, CachedDb, DbClient, DbConfig,
    DispatcherConfig, EventDispatcher, StorageBackend,
};
use jobboard_core::JobBoardError;
use jobboard_storage::{InMemoryStore, JobBoardStore};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let api_config = ApiConfig::from_env();
    let cache_config = CacheBackendConfig::from_env().map_err(JobBoardError::from)?;

    let store = open_store(StorageBackend::from_env().map_err(JobBoardError::from)?).await?;
    let cache = cache_config.build()?;
    let db = CachedDb::new(store, cache);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (events, dispatcher_handle) =
        EventDispatcher::spawn(db.clone(), DispatcherConfig::from_env(), shutdown_rx.clone());

    let maintenance_config = CacheMaintenanceConfig {
        check_interval: cache_config.maintenance_interval,
        ..CacheMaintenanceConfig::from_env()
    };
    let maintenance_handle = tokio::spawn(cache_maintenance_task(
        db.clone(),
        maintenance_config,
        shutdown_rx,
    ));

    let bind_addr = api_config.bind_addr.clone();
    let app = create_api_router(AppState::new(db, events, api_config));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", bind_addr, e)))?;
    tracing::info!(addr = %bind_addr, "Starting job board API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    // Workers drain what is queued before they return.
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher_handle.await {
        tracing::error!(error = %e, "Event dispatcher panicked");
    }
    if let Err(e) = maintenance_handle.await {
        tracing::error!(error = %e, "Cache maintenance task panicked");
    }

    Ok(())
}

async fn open_store(backend: StorageBackend) -> ApiResult<Arc<dyn JobBoardStore>> {
    match backend {
        StorageBackend::Postgres => {
            let db = DbClient::from_config(&DbConfig::from_env())?;
            db.migrate().await?;
            tracing::info!(pool_size = db.pool_size(), "Connected to Postgres");
            Ok(Arc::new(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
