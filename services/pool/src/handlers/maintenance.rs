//! `start`/`stop`/`restart` maintenance verbs.
//!
//! These operate on a single existing cluster without changing lease state.

use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::error::PoolError;
use crate::state::AppState;

fn parse_cluster_id(raw: &str) -> Result<fleetpool_domain::id::ClusterId, PoolError> {
    raw.parse()
        .map_err(|_| PoolError::InvalidInput(format!("invalid cluster id: {raw}")))
}

pub async fn stop_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, PoolError> {
    let id = parse_cluster_id(&id)?;
    state.engine.stop(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, PoolError> {
    let id = parse_cluster_id(&id)?;
    state.engine.start(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restart_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, PoolError> {
    let id = parse_cluster_id(&id)?;
    state.engine.restart(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
