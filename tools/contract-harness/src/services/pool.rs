//! Pool service contract runner (requires `--features pool`).

use std::path::Path;

use anyhow::Result;
use fleetpool_pool::engine::lifecycle::LifecycleEngine;
use fleetpool_pool::infra::backend::{BollardContainerBackend, ComposeTemplate};
use fleetpool_pool::infra::db::{DbClusterStore, DbHostRegistry};
use fleetpool_pool::router::build_router;
use fleetpool_pool::state::AppState;
use fleetpool_pool_migration::Migrator;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;

use crate::{config::ContractHarnessConfig, fixture, reporter, runner::Runner, services::InfraUrls};

/// Run pool migrations, start the pool service in-process, run all pool fixtures.
///
/// Returns `true` if every fixture passed.
pub async fn run(
    infra: &InfraUrls,
    config: &ContractHarnessConfig,
    workspace_root: &Path,
) -> Result<bool> {
    // ── DB + migrations ────────────────────────────────────────────────────
    let db = Database::connect(&infra.database_url).await?;
    Migrator::up(&db, None).await?;

    // ── Engine, backed by a Docker adapter against the harness's own daemon ──
    let template = ComposeTemplate::load(&config.compose_file_path)?;
    let backend = BollardContainerBackend::new(template, 30);
    let engine = LifecycleEngine::new(
        DbClusterStore { db: db.clone() },
        DbHostRegistry { db: db.clone() },
        backend,
        config.cluster_api_port_start,
    );

    // ── Start pool service on a random OS-assigned port ─────────────────────
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let base_url = format!("http://127.0.0.1:{port}");

    let state = AppState {
        db,
        engine,
        consensus_plugins: config.consensus_plugins.clone(),
        consensus_modes: config.consensus_modes.clone(),
        cluster_sizes: config.cluster_sizes.clone(),
    };
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    // ── Load fixtures and run ──────────────────────────────────────────────
    let fixtures = fixture::load_all(workspace_root, Some("pool"))?;
    let runner = Runner::new(&base_url);
    let mut rep = reporter::Reporter::new();

    for f in &fixtures {
        let result = runner.run(f).await;
        rep.record(f, result);
    }

    rep.print_summary();
    Ok(rep.all_passed())
}
