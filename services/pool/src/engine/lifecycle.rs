use chrono::Utc;
use uuid::Uuid;

use fleetpool_domain::id::{ClusterId, HostId};

use crate::domain::repository::{
    ActiveClusterPatch, ClusterStore, ContainerBackend, HostRegistry, ReleaseSelector,
};
use crate::domain::types::{
    Cluster, ClusterCondition, ClusterFilter, ClusterProjection, ClusterShape, ClusterStatus,
    Collection, NewCluster, NOT_READY_FOR_APPLY,
};
use crate::engine::port_allocator::{allocate_one, parse_daemon_url};
use crate::engine::replenish;
use crate::error::PoolError;

/// Orchestrates create/delete/apply/release/start/stop/restart, enforcing
/// the cluster lifecycle state machine and its concurrency contract.
///
/// Generic over the three collaborator ports rather than `dyn`, since their
/// methods are `async fn`s in traits and thus not object-safe.
#[derive(Clone)]
pub struct LifecycleEngine<S, H, B>
where
    S: ClusterStore + Clone + Send + Sync + 'static,
    H: HostRegistry + Clone + Send + Sync + 'static,
    B: ContainerBackend + Clone + Send + Sync + 'static,
{
    pub store: S,
    pub hosts: H,
    pub backend: B,
    /// First port candidate handed to the allocator (`CLUSTER_API_PORT_START`).
    pub port_start: u16,
}

impl<S, H, B> LifecycleEngine<S, H, B>
where
    S: ClusterStore + Clone + Send + Sync + 'static,
    H: HostRegistry + Clone + Send + Sync + 'static,
    B: ContainerBackend + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, hosts: H, backend: B, port_start: u16) -> Self {
        Self {
            store,
            hosts,
            backend,
            port_start,
        }
    }

    /// Provisions a new cluster on `host_id`, starting its backend
    /// composition before the record becomes visible as idle.
    pub async fn create(
        &self,
        name: String,
        host_id: HostId,
        shape: ClusterShape,
        explicit_api_port: Option<u16>,
        user_id: Option<String>,
    ) -> Result<Cluster, PoolError> {
        let host = self
            .hosts
            .get(&host_id)
            .await?
            .ok_or(PoolError::NotFound)?;
        if !host.has_room() {
            return Err(PoolError::CapacityExceeded);
        }
        let daemon = parse_daemon_url(&host.daemon_url)?;
        if !self.backend.ping(&host.daemon_url).await? {
            return Err(PoolError::BackendUnreachable);
        }

        let used_ports = used_ports_on_host(&self.store, &host_id).await?;
        let port = allocate_one(self.port_start, &used_ports, explicit_api_port)?;
        let api_url = format!("http://{}:{port}", daemon.ip);

        let provisional_user = user_id.clone().unwrap_or_else(|| NOT_READY_FOR_APPLY.to_owned());
        let inserted = self
            .store
            .insert_active(NewCluster {
                name,
                host_id: host_id.clone(),
                api_url,
                user_id: provisional_user,
                shape,
            })
            .await?;

        let containers = match self
            .backend
            .start_composition(&inserted.id.to_string(), port, &host.daemon_url)
            .await
        {
            Ok(ids) if !ids.is_empty() => ids,
            Ok(_) => {
                self.force_delete_provisioning(&inserted).await;
                return Err(PoolError::BackendStartFailed);
            }
            Err(_) => {
                self.force_delete_provisioning(&inserted).await;
                return Err(PoolError::BackendStartFailed);
            }
        };

        if !self.hosts.attach_cluster(&host_id, inserted.id).await? {
            // Lost the capacity race after the advisory check above; the
            // atomic attach is the authoritative guard.
            self.force_delete_provisioning(&inserted).await;
            return Err(PoolError::CapacityExceeded);
        }

        let final_user_id = user_id.unwrap_or_default();
        let updated = self
            .store
            .update_active(
                inserted.id,
                ActiveClusterPatch {
                    user_id: Some(final_user_id),
                    status: Some(ClusterStatus::Idle),
                    node_containers: Some(containers),
                    apply_ts: None,
                },
            )
            .await?;
        Ok(updated)
    }

    /// Roll back a just-inserted `Provisioning` record with no archive.
    async fn force_delete_provisioning(&self, cluster: &Cluster) {
        if let Err(e) = self.store.delete_active(cluster.id).await {
            tracing::error!(error = %e, cluster_id = %cluster.id, "failed to roll back provisioning cluster");
        }
    }

    /// Tears down a cluster's backend composition and removes its record,
    /// archiving it first unless `record_archive` is false.
    pub async fn delete(
        &self,
        id: ClusterId,
        from: Collection,
        record_archive: bool,
        forced: bool,
    ) -> Result<(), PoolError> {
        let record = match from {
            Collection::Active => self
                .store
                .find_one_active(&ClusterFilter::by_id(id))
                .await?
                .ok_or(PoolError::NotFound)?,
            Collection::Released => {
                self.store
                    .find_one_released(&ClusterFilter::by_id(id))
                    .await?
                    .ok_or(PoolError::NotFound)?;
                self.store.delete_released(id).await?;
                return Ok(());
            }
        };

        if !forced && !record.user_id.is_empty() {
            return Err(PoolError::LeaseConflict);
        }

        if let Ok(daemon_url) = self.host_daemon_url(&record.host_id).await {
            if let Some(daemon_url) = daemon_url {
                let port = extract_port(&record.api_url).unwrap_or(0);
                if let Err(e) = self
                    .backend
                    .stop_composition(&record.id.to_string(), port, &daemon_url)
                    .await
                {
                    tracing::warn!(error = %e, cluster_id = %record.id, "stop_composition failed during delete");
                }
                if let Err(e) = self.backend.clean_exited(&daemon_url).await {
                    tracing::warn!(error = %e, cluster_id = %record.id, "clean_exited failed during delete");
                }
                if let Err(e) = self
                    .backend
                    .clean_images(&daemon_url, &record.id.to_string())
                    .await
                {
                    tracing::warn!(error = %e, cluster_id = %record.id, "clean_images failed during delete");
                }
            }
        }

        if record_archive {
            let mut archived = record.clone();
            if archived.release_ts.is_none() {
                archived.release_ts = Some(Utc::now());
            }
            if let Err(e) = self.store.insert_released(archived).await {
                // Logged, but delete still completes.
                tracing::error!(
                    error = %e,
                    cluster_id = %record.id,
                    kind = PoolError::ArchiveFailure.kind(),
                    "failed to archive cluster"
                );
            }
        }

        if let Err(e) = self.hosts.detach_cluster(&record.host_id, id).await {
            tracing::warn!(error = %e, cluster_id = %record.id, "failed to detach cluster from host");
        }

        self.store.delete_active(id).await?;
        Ok(())
    }

    /// Claims an idle cluster on the first active host matching `condition`
    /// for `user_id`, or returns the caller's existing lease if one is live
    /// and `allow_multiple` is false.
    pub async fn apply(
        &self,
        user_id: &str,
        condition: ClusterCondition,
        allow_multiple: bool,
    ) -> Result<ClusterProjection, PoolError> {
        let host = self
            .hosts
            .find_any_active()
            .await?
            .ok_or(PoolError::NotFound)?;

        if !allow_multiple {
            let existing = self
                .store
                .find_one_active(&ClusterFilter {
                    host_id: Some(host.id.clone()),
                    user_id: Some(crate::domain::types::UserIdFilter::Eq(user_id.to_owned())),
                    ..Default::default()
                })
                .await?;
            if let Some(existing) = existing {
                if existing.release_ts.is_none() {
                    let mut projection: ClusterProjection = existing.into();
                    projection.daemon_url = Some(host.daemon_url.clone());
                    return Ok(projection);
                }
            }
        }

        let claimed = self
            .store
            .claim_idle(&host.id, &condition, user_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or(PoolError::LeaseConflict)?;

        let mut projection: ClusterProjection = claimed.into();
        projection.daemon_url = Some(host.daemon_url.clone());
        Ok(projection)
    }

    /// Marks a leased cluster as releasing and spawns a background recycle.
    /// Both entry points in `ReleaseSelector` share this post-selection logic.
    pub async fn release(&self, selector: ReleaseSelector<'_>) -> Result<(), PoolError> {
        let released = self
            .store
            .mark_releasing(selector)
            .await?
            .filter(|c| c.release_ts.is_some())
            .ok_or(PoolError::NotFound)?;

        let engine = self.clone();
        tokio::spawn(async move {
            replenish::recycle(engine, released).await;
        });

        Ok(())
    }

    /// Stops and removes a cluster's containers, clearing `node_containers`
    /// but leaving lease state untouched.
    pub async fn stop(&self, id: ClusterId) -> Result<(), PoolError> {
        let record = self
            .store
            .find_one_active(&ClusterFilter::by_id(id))
            .await?
            .ok_or(PoolError::NotFound)?;
        let daemon_url = self
            .host_daemon_url(&record.host_id)
            .await?
            .ok_or(PoolError::NotFound)?;
        let port = extract_port(&record.api_url).unwrap_or(0);
        self.backend
            .stop_composition(&record.id.to_string(), port, &daemon_url)
            .await?;
        self.store
            .update_active(
                id,
                ActiveClusterPatch {
                    node_containers: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Starts a cluster's backend composition and records the returned
    /// container ids.
    pub async fn start(&self, id: ClusterId) -> Result<(), PoolError> {
        let record = self
            .store
            .find_one_active(&ClusterFilter::by_id(id))
            .await?
            .ok_or(PoolError::NotFound)?;
        let daemon_url = self
            .host_daemon_url(&record.host_id)
            .await?
            .ok_or(PoolError::NotFound)?;
        let port = extract_port(&record.api_url).unwrap_or(0);
        let containers = self
            .backend
            .start_composition(&record.id.to_string(), port, &daemon_url)
            .await?;
        self.store
            .update_active(
                id,
                ActiveClusterPatch {
                    node_containers: Some(containers),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// `restart` is `stop` then `start`. Neither touches lease state.
    pub async fn restart(&self, id: ClusterId) -> Result<(), PoolError> {
        self.stop(id).await?;
        self.start(id).await
    }

    /// Never errors on a missing id — returns `None` so the facade can
    /// render an empty projection.
    pub async fn get(&self, id: ClusterId, from: Collection) -> Result<Option<Cluster>, PoolError> {
        match from {
            Collection::Active => self.store.find_one_active(&ClusterFilter::by_id(id)).await,
            Collection::Released => {
                self.store.find_one_released(&ClusterFilter::by_id(id)).await
            }
        }
    }

    pub async fn list(
        &self,
        filter: ClusterFilter,
        from: Collection,
    ) -> Result<Vec<Cluster>, PoolError> {
        match from {
            Collection::Active => self.store.find_active(&filter).await,
            Collection::Released => self.store.find_released(&filter).await,
        }
    }

    async fn host_daemon_url(&self, host_id: &HostId) -> Result<Option<String>, PoolError> {
        Ok(self.hosts.get(host_id).await?.map(|h| h.daemon_url))
    }
}

async fn used_ports_on_host<S: ClusterStore>(
    store: &S,
    host_id: &HostId,
) -> Result<std::collections::HashSet<u16>, PoolError> {
    let clusters = store
        .find_active(&ClusterFilter {
            host_id: Some(host_id.clone()),
            ..Default::default()
        })
        .await?;
    Ok(clusters
        .iter()
        .filter_map(|c| extract_port(&c.api_url))
        .collect())
}

fn extract_port(api_url: &str) -> Option<u16> {
    api_url.rsplit(':').next()?.parse().ok()
}

/// Generates a fresh cluster id ahead of insert, used by the replenish
/// worker when recreating after a recycle.
pub fn new_cluster_id() -> ClusterId {
    ClusterId(Uuid::now_v7())
}
