use sea_orm::Database;
use tracing::info;

use fleetpool_pool::config::PoolConfig;
use fleetpool_pool::engine::lifecycle::LifecycleEngine;
use fleetpool_pool::infra::backend::{BollardContainerBackend, ComposeTemplate};
use fleetpool_pool::infra::db::{DbClusterStore, DbHostRegistry};
use fleetpool_pool::router::build_router;
use fleetpool_pool::state::AppState;

#[tokio::main]
async fn main() {
    fleetpool_core::tracing::init_tracing();

    let config = PoolConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let template = ComposeTemplate::load(&config.compose_file_path)
        .expect("failed to load COMPOSE_FILE_PATH");
    let backend = BollardContainerBackend::new(template, config.docker_connect_timeout_secs);

    let engine = LifecycleEngine::new(
        DbClusterStore { db: db.clone() },
        DbHostRegistry { db: db.clone() },
        backend,
        config.cluster_api_port_start,
    );

    let state = AppState {
        db,
        engine,
        consensus_plugins: config.consensus_plugins,
        consensus_modes: config.consensus_modes,
        cluster_sizes: config.cluster_sizes,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.pool_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("pool service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
