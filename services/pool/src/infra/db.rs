use anyhow::Context as _;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, QuerySelect, Statement, TransactionTrait,
};
use uuid::Uuid;

use fleetpool_domain::id::{ClusterId, HostId};
use fleetpool_pool_schema::{active_clusters, hosts, released_clusters};

use crate::domain::repository::{
    ActiveClusterPatch, ClusterStore, HostRegistry, ReleaseSelector,
};
use crate::domain::types::{
    Cluster, ClusterCondition, ClusterFilter, ClusterShape, ClusterStatus, Host, NewCluster,
    UserIdFilter,
};
use crate::error::PoolError;

// ── ClusterStore ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbClusterStore {
    pub db: DatabaseConnection,
}

impl ClusterStore for DbClusterStore {
    async fn insert_active(&self, new: NewCluster) -> Result<Cluster, PoolError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let model = active_clusters::ActiveModel {
            id: Set(id),
            name: Set(new.name),
            host_id: Set(new.host_id.0.clone()),
            api_url: Set(new.api_url),
            user_id: Set(new.user_id),
            status: Set(active_clusters::ClusterStatus::Provisioning),
            consensus_plugin: Set(new.shape.consensus_plugin),
            consensus_mode: Set(new.shape.consensus_mode),
            size: Set(new.shape.size),
            node_containers: Set(Vec::new()),
            create_ts: Set(now),
            apply_ts: Set(None),
            release_ts: Set(None),
        };
        let inserted = model.insert(&self.db).await.context("insert cluster")?;
        Ok(cluster_from_active_model(inserted))
    }

    async fn find_one_active(&self, filter: &ClusterFilter) -> Result<Option<Cluster>, PoolError> {
        let model = apply_active_filter(active_clusters::Entity::find(), filter)
            .one(&self.db)
            .await
            .context("find one active cluster")?;
        Ok(model.map(cluster_from_active_model))
    }

    async fn find_active(&self, filter: &ClusterFilter) -> Result<Vec<Cluster>, PoolError> {
        let models = apply_active_filter(active_clusters::Entity::find(), filter)
            .all(&self.db)
            .await
            .context("find active clusters")?;
        Ok(models.into_iter().map(cluster_from_active_model).collect())
    }

    async fn find_one_released(
        &self,
        filter: &ClusterFilter,
    ) -> Result<Option<Cluster>, PoolError> {
        let model = apply_released_filter(released_clusters::Entity::find(), filter)
            .one(&self.db)
            .await
            .context("find one released cluster")?;
        Ok(model.map(cluster_from_released_model))
    }

    async fn find_released(&self, filter: &ClusterFilter) -> Result<Vec<Cluster>, PoolError> {
        let models = apply_released_filter(released_clusters::Entity::find(), filter)
            .all(&self.db)
            .await
            .context("find released clusters")?;
        Ok(models.into_iter().map(cluster_from_released_model).collect())
    }

    async fn update_active(
        &self,
        id: ClusterId,
        patch: ActiveClusterPatch,
    ) -> Result<Cluster, PoolError> {
        let mut model = active_clusters::ActiveModel {
            id: Set(id.0),
            ..Default::default()
        };
        if let Some(user_id) = patch.user_id {
            model.user_id = Set(user_id);
        }
        if let Some(status) = patch.status {
            model.status = Set(status.into());
        }
        if let Some(containers) = patch.node_containers {
            model.node_containers = Set(containers);
        }
        if let Some(apply_ts) = patch.apply_ts {
            model.apply_ts = Set(Some(apply_ts));
        }
        let updated = model.update(&self.db).await.context("update cluster")?;
        Ok(cluster_from_active_model(updated))
    }

    /// Atomic claim via `SELECT ... FOR UPDATE` inside a transaction: the row
    /// lock blocks a concurrent claimant until this transaction commits, at
    /// which point its own `WHERE user_id = ''` re-evaluates against the
    /// now-committed (claimed) row and finds nothing.
    async fn claim_idle(
        &self,
        host_id: &HostId,
        condition: &ClusterCondition,
        user_id: &str,
    ) -> Result<Option<Cluster>, PoolError> {
        let txn = self.db.begin().await.context("begin claim_idle txn")?;

        let mut query = active_clusters::Entity::find()
            .filter(active_clusters::Column::HostId.eq(host_id.0.clone()))
            .filter(active_clusters::Column::Status.eq(active_clusters::ClusterStatus::Idle))
            .filter(active_clusters::Column::UserId.eq(""));
        if let Some(ref plugin) = condition.consensus_plugin {
            query = query.filter(active_clusters::Column::ConsensusPlugin.eq(plugin.clone()));
        }
        if let Some(ref mode) = condition.consensus_mode {
            query = query.filter(active_clusters::Column::ConsensusMode.eq(mode.clone()));
        }
        if let Some(size) = condition.size {
            query = query.filter(active_clusters::Column::Size.eq(size));
        }

        let candidate = query
            .lock_exclusive()
            .one(&txn)
            .await
            .context("select idle cluster for update")?;
        let Some(candidate) = candidate else {
            txn.commit().await.context("commit empty claim_idle txn")?;
            return Ok(None);
        };

        let now = Utc::now();
        let updated = active_clusters::ActiveModel {
            id: Set(candidate.id),
            user_id: Set(user_id.to_owned()),
            status: Set(active_clusters::ClusterStatus::Leased),
            apply_ts: Set(Some(now)),
            ..Default::default()
        }
        .update(&txn)
        .await
        .context("claim idle cluster")?;

        txn.commit().await.context("commit claim_idle txn")?;
        Ok(Some(cluster_from_active_model(updated)))
    }

    /// Same `SELECT ... FOR UPDATE` pattern as `claim_idle`, guaranteeing
    /// at-most-once recycling per lease.
    async fn mark_releasing(
        &self,
        selector: ReleaseSelector<'_>,
    ) -> Result<Option<Cluster>, PoolError> {
        let txn = self.db.begin().await.context("begin mark_releasing txn")?;

        let query = active_clusters::Entity::find().filter(active_clusters::Column::ReleaseTs.is_null());
        let query = match selector {
            ReleaseSelector::ByClusterId(id) => {
                query.filter(active_clusters::Column::Id.eq(id.0))
            }
            ReleaseSelector::ByUserId(user_id) => {
                query.filter(active_clusters::Column::UserId.eq(user_id))
            }
        };

        let candidate = query
            .lock_exclusive()
            .one(&txn)
            .await
            .context("select leased cluster for update")?;
        let Some(candidate) = candidate else {
            txn.commit().await.context("commit empty mark_releasing txn")?;
            return Ok(None);
        };

        let now = Utc::now();
        let updated = active_clusters::ActiveModel {
            id: Set(candidate.id),
            status: Set(active_clusters::ClusterStatus::Releasing),
            release_ts: Set(Some(now)),
            ..Default::default()
        }
        .update(&txn)
        .await
        .context("mark cluster releasing")?;

        txn.commit().await.context("commit mark_releasing txn")?;
        Ok(Some(cluster_from_active_model(updated)))
    }

    async fn delete_active(&self, id: ClusterId) -> Result<bool, PoolError> {
        let result = active_clusters::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .context("delete active cluster")?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_released(&self, id: ClusterId) -> Result<bool, PoolError> {
        let result = released_clusters::Entity::delete_by_id(id.0)
            .exec(&self.db)
            .await
            .context("delete released cluster")?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_released(&self, cluster: Cluster) -> Result<(), PoolError> {
        let model = released_clusters::ActiveModel {
            id: Set(cluster.id.0),
            name: Set(cluster.name),
            host_id: Set(cluster.host_id.0),
            api_url: Set(cluster.api_url),
            user_id: Set(cluster.user_id),
            status: Set(cluster.status.into()),
            consensus_plugin: Set(cluster.shape.consensus_plugin),
            consensus_mode: Set(cluster.shape.consensus_mode),
            size: Set(cluster.shape.size),
            node_containers: Set(cluster.node_containers),
            create_ts: Set(cluster.create_ts),
            apply_ts: Set(cluster.apply_ts),
            release_ts: Set(cluster.release_ts),
        };
        // Duplicate-insert failures are logged and swallowed by the caller;
        // this surfaces the raw error upward.
        model.insert(&self.db).await.context("insert released cluster")?;
        Ok(())
    }
}

fn apply_active_filter(
    query: sea_orm::Select<active_clusters::Entity>,
    filter: &ClusterFilter,
) -> sea_orm::Select<active_clusters::Entity> {
    let mut query = query;
    if let Some(id) = filter.id {
        query = query.filter(active_clusters::Column::Id.eq(id.0));
    }
    if let Some(ref host_id) = filter.host_id {
        query = query.filter(active_clusters::Column::HostId.eq(host_id.0.clone()));
    }
    if let Some(ref user_id) = filter.user_id {
        query = match user_id {
            UserIdFilter::Eq(v) => query.filter(active_clusters::Column::UserId.eq(v.clone())),
            UserIdFilter::Ne(v) => query.filter(active_clusters::Column::UserId.ne(v.clone())),
        };
    }
    query
}

fn apply_released_filter(
    query: sea_orm::Select<released_clusters::Entity>,
    filter: &ClusterFilter,
) -> sea_orm::Select<released_clusters::Entity> {
    let mut query = query;
    if let Some(id) = filter.id {
        query = query.filter(released_clusters::Column::Id.eq(id.0));
    }
    if let Some(ref host_id) = filter.host_id {
        query = query.filter(released_clusters::Column::HostId.eq(host_id.0.clone()));
    }
    if let Some(ref user_id) = filter.user_id {
        query = match user_id {
            UserIdFilter::Eq(v) => query.filter(released_clusters::Column::UserId.eq(v.clone())),
            UserIdFilter::Ne(v) => query.filter(released_clusters::Column::UserId.ne(v.clone())),
        };
    }
    query
}

impl From<ClusterStatus> for active_clusters::ClusterStatus {
    fn from(status: ClusterStatus) -> Self {
        match status {
            ClusterStatus::Provisioning => Self::Provisioning,
            ClusterStatus::Idle => Self::Idle,
            ClusterStatus::Leased => Self::Leased,
            ClusterStatus::Releasing => Self::Releasing,
        }
    }
}

impl From<active_clusters::ClusterStatus> for ClusterStatus {
    fn from(status: active_clusters::ClusterStatus) -> Self {
        match status {
            active_clusters::ClusterStatus::Provisioning => Self::Provisioning,
            active_clusters::ClusterStatus::Idle => Self::Idle,
            active_clusters::ClusterStatus::Leased => Self::Leased,
            active_clusters::ClusterStatus::Releasing => Self::Releasing,
        }
    }
}

fn cluster_from_active_model(model: active_clusters::Model) -> Cluster {
    Cluster {
        id: ClusterId(model.id),
        name: model.name,
        host_id: HostId(model.host_id),
        api_url: model.api_url,
        user_id: model.user_id,
        status: model.status.into(),
        shape: ClusterShape {
            consensus_plugin: model.consensus_plugin,
            consensus_mode: model.consensus_mode,
            size: model.size,
        },
        node_containers: model.node_containers,
        create_ts: model.create_ts,
        apply_ts: model.apply_ts,
        release_ts: model.release_ts,
    }
}

fn cluster_from_released_model(model: released_clusters::Model) -> Cluster {
    Cluster {
        id: ClusterId(model.id),
        name: model.name,
        host_id: HostId(model.host_id),
        api_url: model.api_url,
        user_id: model.user_id,
        status: model.status.into(),
        shape: ClusterShape {
            consensus_plugin: model.consensus_plugin,
            consensus_mode: model.consensus_mode,
            size: model.size,
        },
        node_containers: model.node_containers,
        create_ts: model.create_ts,
        apply_ts: model.apply_ts,
        release_ts: model.release_ts,
    }
}

// ── HostRegistry ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbHostRegistry {
    pub db: DatabaseConnection,
}

impl HostRegistry for DbHostRegistry {
    async fn get(&self, id: &HostId) -> Result<Option<Host>, PoolError> {
        let model = hosts::Entity::find_by_id(id.0.clone())
            .one(&self.db)
            .await
            .context("find host")?;
        Ok(model.map(host_from_model))
    }

    async fn list_active(&self) -> Result<Vec<Host>, PoolError> {
        let models = hosts::Entity::find()
            .filter(hosts::Column::Status.eq("active"))
            .all(&self.db)
            .await
            .context("list active hosts")?;
        Ok(models
            .into_iter()
            .map(host_from_model)
            .filter(|h| h.has_room())
            .collect())
    }

    async fn find_any_active(&self) -> Result<Option<Host>, PoolError> {
        let model = hosts::Entity::find()
            .filter(hosts::Column::Status.eq("active"))
            .one(&self.db)
            .await
            .context("find any active host")?;
        Ok(model.map(host_from_model))
    }

    /// `array_append` with a capacity-guarded `WHERE` is atomic: the update
    /// either appends under the row lock taken by the UPDATE itself, or
    /// matches zero rows when capacity is already exhausted. This avoids a
    /// separate read before the write, closing the race a read-modify-write
    /// would leave open between two concurrent attaches on the same host.
    async fn attach_cluster(
        &self,
        host_id: &HostId,
        cluster_id: ClusterId,
    ) -> Result<bool, PoolError> {
        let cluster_id_str = cluster_id.to_string();
        // cardinality() treats an empty array as 0, so this single predicate
        // covers a brand new host with no special-casing.
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE hosts
            SET clusters = array_append(clusters, $1)
            WHERE id = $2
              AND NOT ($1 = ANY(clusters))
              AND cardinality(clusters) < capacity
            "#,
            [cluster_id_str.into(), host_id.0.clone().into()],
        );
        let result = self
            .db
            .execute(stmt)
            .await
            .context("attach cluster to host")?;
        Ok(result.rows_affected() > 0)
    }

    async fn detach_cluster(&self, host_id: &HostId, cluster_id: ClusterId) -> Result<(), PoolError> {
        let cluster_id_str = cluster_id.to_string();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE hosts
            SET clusters = array_remove(clusters, $1)
            WHERE id = $2
            "#,
            [cluster_id_str.into(), host_id.0.clone().into()],
        );
        self.db
            .execute(stmt)
            .await
            .context("detach cluster from host")?;
        Ok(())
    }
}

fn host_from_model(model: hosts::Model) -> Host {
    Host {
        id: HostId(model.id),
        daemon_url: model.daemon_url,
        status: model.status,
        capacity: model.capacity,
        clusters: model.clusters,
    }
}
