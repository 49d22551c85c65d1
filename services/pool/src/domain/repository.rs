#![allow(async_fn_in_trait)]

use fleetpool_domain::id::{ClusterId, HostId};

use crate::domain::types::{Cluster, ClusterCondition, ClusterFilter, Host, NewCluster};
use crate::error::PoolError;

/// Two named collections (`active`, `released`) with atomic find-and-update
/// primitives. The atomicity of `claim_idle` and `mark_releasing` is the
/// entire correctness argument for leasing.
pub trait ClusterStore: Send + Sync {
    async fn insert_active(&self, cluster: NewCluster) -> Result<Cluster, PoolError>;

    async fn find_one_active(&self, filter: &ClusterFilter) -> Result<Option<Cluster>, PoolError>;
    async fn find_active(&self, filter: &ClusterFilter) -> Result<Vec<Cluster>, PoolError>;

    async fn find_one_released(
        &self,
        filter: &ClusterFilter,
    ) -> Result<Option<Cluster>, PoolError>;
    async fn find_released(&self, filter: &ClusterFilter) -> Result<Vec<Cluster>, PoolError>;

    /// Unconditional patch of the first match in `active` (used by `create`
    /// to stamp `node_containers`/`user_id` after backend start, and by
    /// `start`/`stop`/`restart`).
    async fn update_active(
        &self,
        id: ClusterId,
        patch: ActiveClusterPatch,
    ) -> Result<Cluster, PoolError>;

    /// Atomically claim an idle cluster matching `condition` for `user_id`.
    /// Returns `Ok(None)` on no match — never an error — so the engine can
    /// distinguish "no resource" from a store failure.
    async fn claim_idle(
        &self,
        host_id: &HostId,
        condition: &ClusterCondition,
        user_id: &str,
    ) -> Result<Option<Cluster>, PoolError>;

    /// Atomically stamp `release_ts = now` on a leased, not-yet-releasing
    /// cluster selected by `selector`. Returns `Ok(None)` if no row matched
    /// (already releasing, or not found).
    async fn mark_releasing(&self, selector: ReleaseSelector<'_>) -> Result<Option<Cluster>, PoolError>;

    async fn delete_active(&self, id: ClusterId) -> Result<bool, PoolError>;
    async fn delete_released(&self, id: ClusterId) -> Result<bool, PoolError>;
    async fn insert_released(&self, cluster: Cluster) -> Result<(), PoolError>;
}

/// Fields `update_active` is permitted to touch, all optional.
#[derive(Debug, Clone, Default)]
pub struct ActiveClusterPatch {
    pub user_id: Option<String>,
    pub status: Option<crate::domain::types::ClusterStatus>,
    pub node_containers: Option<Vec<String>>,
    pub apply_ts: Option<chrono::DateTime<chrono::Utc>>,
}

/// The two entry points `release` supports; both select a single leased,
/// not-yet-releasing record before the atomic patch.
#[derive(Debug, Clone, Copy)]
pub enum ReleaseSelector<'a> {
    ByClusterId(ClusterId),
    ByUserId(&'a str),
}

/// Host records are owned by a registry the engine treats as a narrow port:
/// lookup, list, and atomic list-membership mutation only.
pub trait HostRegistry: Send + Sync {
    async fn get(&self, id: &HostId) -> Result<Option<Host>, PoolError>;

    /// All hosts with `status == "active"` and room for another cluster.
    /// Used by `create`'s advisory capacity check — never by `apply`, which
    /// must be able to lease from a host that is full of idle clusters.
    async fn list_active(&self) -> Result<Vec<Host>, PoolError>;

    /// Any host with `status == "active"`, capacity ignored. `apply` leases
    /// from idle clusters regardless of whether their host still has room
    /// for a new one.
    async fn find_any_active(&self) -> Result<Option<Host>, PoolError>;

    /// Atomically append `cluster_id` to `host_id`'s cluster list, enforcing
    /// `len(clusters) < capacity` in the same statement so two concurrent
    /// `create` calls on a host with one remaining slot cannot both succeed.
    ///
    /// Returns `false` if the host is full or absent; never performs a
    /// separate read before the write.
    async fn attach_cluster(&self, host_id: &HostId, cluster_id: ClusterId)
    -> Result<bool, PoolError>;

    /// Atomically remove `cluster_id` from `host_id`'s cluster list.
    /// Idempotent: removing an absent id is not an error.
    async fn detach_cluster(&self, host_id: &HostId, cluster_id: ClusterId) -> Result<(), PoolError>;
}

/// Backend container orchestration, isolated to five verbs so the engine can
/// be driven in tests without a real container runtime.
pub trait ContainerBackend: Send + Sync {
    /// Brings up the composition for `project_name`, exposing `api_port`,
    /// on `daemon`. Returns the started peers' container ids.
    async fn start_composition(
        &self,
        project_name: &str,
        api_port: u16,
        daemon: &str,
    ) -> Result<Vec<String>, PoolError>;

    /// Stops and removes every container of `project_name`. Idempotent.
    async fn stop_composition(
        &self,
        project_name: &str,
        api_port: u16,
        daemon: &str,
    ) -> Result<(), PoolError>;

    /// Best-effort; callers log failures and proceed regardless.
    async fn clean_exited(&self, daemon: &str) -> Result<(), PoolError>;

    /// Best-effort; callers log failures and proceed regardless.
    async fn clean_images(&self, daemon: &str, prefix: &str) -> Result<(), PoolError>;

    async fn ping(&self, daemon: &str) -> Result<bool, PoolError>;
}
