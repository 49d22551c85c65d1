use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use fleetpool_domain::id::{ClusterId, HostId};

use crate::domain::repository::ReleaseSelector;
use crate::domain::types::{
    ClusterCondition, ClusterFilter, ClusterProjection, ClusterShape, Collection, UserIdFilter,
};
use crate::error::PoolError;
use crate::state::AppState;

// ── POST /clusters ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    pub host_id: String,
    pub consensus_plugin: String,
    pub consensus_mode: String,
    pub size: i32,
    pub api_port: Option<u16>,
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct CreateClusterResponse {
    pub id: String,
}

pub async fn create_cluster(
    State(state): State<AppState>,
    Json(body): Json<CreateClusterRequest>,
) -> Result<(StatusCode, Json<CreateClusterResponse>), PoolError> {
    state.validate_shape(&body.consensus_plugin, &body.consensus_mode, body.size)?;

    let cluster = state
        .engine
        .create(
            body.name,
            HostId(body.host_id),
            ClusterShape {
                consensus_plugin: body.consensus_plugin,
                consensus_mode: body.consensus_mode,
                size: body.size,
            },
            body.api_port,
            body.user_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateClusterResponse {
            id: cluster.id.to_string(),
        }),
    ))
}

// ── DELETE /clusters/{id} ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DeleteClusterParams {
    #[serde(default)]
    pub collection: CollectionParam,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub forced: bool,
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CollectionParam {
    #[default]
    Active,
    Released,
}

impl From<CollectionParam> for Collection {
    fn from(p: CollectionParam) -> Self {
        match p {
            CollectionParam::Active => Collection::Active,
            CollectionParam::Released => Collection::Released,
        }
    }
}

pub async fn delete_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteClusterParams>,
) -> Result<StatusCode, PoolError> {
    let id = parse_cluster_id(&id)?;
    state
        .engine
        .delete(id, params.collection.into(), params.archive, params.forced)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── POST /clusters/apply ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub user_id: String,
    #[serde(default)]
    pub consensus_plugin: Option<String>,
    #[serde(default)]
    pub consensus_mode: Option<String>,
    #[serde(default)]
    pub size: Option<i32>,
    #[serde(default)]
    pub allow_multiple: bool,
}

pub async fn apply_cluster(
    State(state): State<AppState>,
    Json(body): Json<ApplyRequest>,
) -> Result<Json<ClusterProjection>, PoolError> {
    let condition = ClusterCondition {
        consensus_plugin: body.consensus_plugin,
        consensus_mode: body.consensus_mode,
        size: body.size,
    };
    let projection = state
        .engine
        .apply(&body.user_id, condition, body.allow_multiple)
        .await?;
    Ok(Json(projection))
}

// ── POST /clusters/release ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReleaseRequest {
    pub cluster_id: Option<String>,
    pub user_id: Option<String>,
}

pub async fn release_cluster(
    State(state): State<AppState>,
    Json(body): Json<ReleaseRequest>,
) -> Result<StatusCode, PoolError> {
    let selector = match (&body.cluster_id, &body.user_id) {
        (Some(id), _) => ReleaseSelector::ByClusterId(parse_cluster_id(id)?),
        (None, Some(user_id)) => ReleaseSelector::ByUserId(user_id),
        (None, None) => {
            return Err(PoolError::InvalidInput(
                "one of cluster_id or user_id is required".to_owned(),
            ));
        }
    };
    state.engine.release(selector).await?;
    Ok(StatusCode::ACCEPTED)
}

// ── GET /clusters/{id} ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GetClusterParams {
    #[serde(default)]
    pub collection: CollectionParam,
}

pub async fn get_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<GetClusterParams>,
) -> Result<Json<Option<ClusterProjection>>, PoolError> {
    let id = parse_cluster_id(&id)?;
    // `get` never errors on a missing id — it renders an empty projection.
    let cluster = state.engine.get(id, params.collection.into()).await?;
    Ok(Json(cluster.map(ClusterProjection::from)))
}

// ── GET /clusters ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ListClusterParams {
    #[serde(default)]
    pub collection: CollectionParam,
    pub host_id: Option<String>,
    /// `?inused=true` is sugar for `user_id != ""`.
    #[serde(default)]
    pub inused: bool,
    pub user_id: Option<String>,
}

pub async fn list_clusters(
    State(state): State<AppState>,
    Query(params): Query<ListClusterParams>,
) -> Result<Json<Vec<ClusterProjection>>, PoolError> {
    let user_id = if params.inused {
        Some(UserIdFilter::Ne(String::new()))
    } else {
        params.user_id.map(UserIdFilter::Eq)
    };

    let filter = ClusterFilter {
        id: None,
        host_id: params.host_id.map(HostId),
        user_id,
    };
    let clusters = state
        .engine
        .list(filter, params.collection.into())
        .await?;
    Ok(Json(clusters.into_iter().map(ClusterProjection::from).collect()))
}

fn parse_cluster_id(raw: &str) -> Result<ClusterId, PoolError> {
    raw.parse()
        .map_err(|_| PoolError::InvalidInput(format!("invalid cluster id: {raw}")))
}
