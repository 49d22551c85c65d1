use axum::{
    Router,
    routing::{delete, get, post},
};

use fleetpool_core::health::{healthz, readyz};

use crate::handlers::cluster::{
    apply_cluster, create_cluster, delete_cluster, get_cluster, list_clusters, release_cluster,
};
use crate::handlers::maintenance::{restart_cluster, start_cluster, stop_cluster};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Clusters
        .route("/clusters", post(create_cluster))
        .route("/clusters", get(list_clusters))
        .route("/clusters/{id}", get(get_cluster))
        .route("/clusters/{id}", delete(delete_cluster))
        // Lease lifecycle
        .route("/clusters/apply", post(apply_cluster))
        .route("/clusters/release", post(release_cluster))
        // Maintenance
        .route("/clusters/{id}/stop", post(stop_cluster))
        .route("/clusters/{id}/start", post(start_cluster))
        .route("/clusters/{id}/restart", post(restart_cluster))
        .with_state(state)
}
