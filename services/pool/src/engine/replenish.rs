use crate::domain::repository::{ClusterStore, ContainerBackend, HostRegistry};
use crate::domain::types::{Cluster, Collection};
use crate::engine::lifecycle::LifecycleEngine;

/// Post-release tear-down-and-recreate sequence.
///
/// Runs on a task spawned by `LifecycleEngine::release`, not awaited by the
/// caller. There is intentionally no retry: a second `release` re-triggers
/// this same path, and a bare log is the only observable effect of failure.
pub async fn recycle<S, H, B>(engine: LifecycleEngine<S, H, B>, released: Cluster)
where
    S: ClusterStore + Clone + Send + Sync + 'static,
    H: HostRegistry + Clone + Send + Sync + 'static,
    B: ContainerBackend + Clone + Send + Sync + 'static,
{
    let cluster_id = released.id;
    if let Err(e) = engine
        .delete(cluster_id, Collection::Active, true, true)
        .await
    {
        tracing::error!(error = %e, cluster_id = %cluster_id, "recycle: failed to archive released cluster");
        return;
    }

    if let Err(e) = engine
        .create(
            released.name.clone(),
            released.host_id.clone(),
            released.shape.clone(),
            None,
            None,
        )
        .await
    {
        tracing::error!(error = %e, cluster_id = %cluster_id, "recycle: failed to recreate pool slot");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::domain::repository::{ActiveClusterPatch, ReleaseSelector};
    use crate::domain::types::{
        ClusterCondition, ClusterFilter, ClusterShape, ClusterStatus, Host, NewCluster,
        NOT_READY_FOR_APPLY,
    };
    use crate::error::PoolError;
    use fleetpool_domain::id::{ClusterId, HostId};

    #[derive(Clone, Default)]
    struct MockStore {
        active: std::sync::Arc<Mutex<HashMap<ClusterId, Cluster>>>,
        deleted: std::sync::Arc<Mutex<Vec<ClusterId>>>,
    }

    impl ClusterStore for MockStore {
        async fn insert_active(&self, new: NewCluster) -> Result<Cluster, PoolError> {
            let cluster = Cluster {
                id: ClusterId(uuid::Uuid::now_v7()),
                name: new.name,
                host_id: new.host_id,
                api_url: new.api_url,
                user_id: new.user_id,
                status: ClusterStatus::Provisioning,
                shape: new.shape,
                node_containers: Vec::new(),
                create_ts: Utc::now(),
                apply_ts: None,
                release_ts: None,
            };
            self.active.lock().unwrap().insert(cluster.id, cluster.clone());
            Ok(cluster)
        }

        async fn find_one_active(
            &self,
            filter: &ClusterFilter,
        ) -> Result<Option<Cluster>, PoolError> {
            let active = self.active.lock().unwrap();
            Ok(filter
                .id
                .and_then(|id| active.get(&id).cloned()))
        }

        async fn find_active(&self, _filter: &ClusterFilter) -> Result<Vec<Cluster>, PoolError> {
            Ok(self.active.lock().unwrap().values().cloned().collect())
        }

        async fn find_one_released(
            &self,
            _filter: &ClusterFilter,
        ) -> Result<Option<Cluster>, PoolError> {
            Ok(None)
        }

        async fn find_released(&self, _filter: &ClusterFilter) -> Result<Vec<Cluster>, PoolError> {
            Ok(Vec::new())
        }

        async fn update_active(
            &self,
            id: ClusterId,
            patch: ActiveClusterPatch,
        ) -> Result<Cluster, PoolError> {
            let mut active = self.active.lock().unwrap();
            let cluster = active.get_mut(&id).ok_or(PoolError::NotFound)?;
            if let Some(user_id) = patch.user_id {
                cluster.user_id = user_id;
            }
            if let Some(status) = patch.status {
                cluster.status = status;
            }
            if let Some(containers) = patch.node_containers {
                cluster.node_containers = containers;
            }
            Ok(cluster.clone())
        }

        async fn claim_idle(
            &self,
            _host_id: &HostId,
            _condition: &ClusterCondition,
            _user_id: &str,
        ) -> Result<Option<Cluster>, PoolError> {
            Ok(None)
        }

        async fn mark_releasing(
            &self,
            _selector: ReleaseSelector<'_>,
        ) -> Result<Option<Cluster>, PoolError> {
            Ok(None)
        }

        async fn delete_active(&self, id: ClusterId) -> Result<bool, PoolError> {
            self.deleted.lock().unwrap().push(id);
            Ok(self.active.lock().unwrap().remove(&id).is_some())
        }

        async fn delete_released(&self, _id: ClusterId) -> Result<bool, PoolError> {
            Ok(false)
        }

        async fn insert_released(&self, _cluster: Cluster) -> Result<(), PoolError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MockHosts {
        host: Option<Host>,
    }

    impl HostRegistry for MockHosts {
        async fn get(&self, _id: &HostId) -> Result<Option<Host>, PoolError> {
            Ok(self.host.clone())
        }

        async fn list_active(&self) -> Result<Vec<Host>, PoolError> {
            Ok(self.host.clone().into_iter().collect())
        }

        async fn find_any_active(&self) -> Result<Option<Host>, PoolError> {
            Ok(self.host.clone())
        }

        async fn attach_cluster(
            &self,
            _host_id: &HostId,
            _cluster_id: ClusterId,
        ) -> Result<bool, PoolError> {
            Ok(true)
        }

        async fn detach_cluster(
            &self,
            _host_id: &HostId,
            _cluster_id: ClusterId,
        ) -> Result<(), PoolError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MockBackend;

    impl ContainerBackend for MockBackend {
        async fn start_composition(
            &self,
            _project_name: &str,
            _api_port: u16,
            _daemon: &str,
        ) -> Result<Vec<String>, PoolError> {
            Ok(vec!["container-1".to_owned()])
        }

        async fn stop_composition(
            &self,
            _project_name: &str,
            _api_port: u16,
            _daemon: &str,
        ) -> Result<(), PoolError> {
            Ok(())
        }

        async fn clean_exited(&self, _daemon: &str) -> Result<(), PoolError> {
            Ok(())
        }

        async fn clean_images(&self, _daemon: &str, _prefix: &str) -> Result<(), PoolError> {
            Ok(())
        }

        async fn ping(&self, _daemon: &str) -> Result<bool, PoolError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn should_delete_then_recreate_on_recycle() {
        let host = Host {
            id: HostId("h1".into()),
            daemon_url: "tcp://10.0.0.1:2376".into(),
            status: "active".into(),
            capacity: 4,
            clusters: vec![],
        };
        let store = MockStore::default();
        let released = store
            .insert_active(NewCluster {
                name: "c1".into(),
                host_id: host.id.clone(),
                api_url: "http://10.0.0.1:30000".into(),
                user_id: NOT_READY_FOR_APPLY.to_owned(),
                shape: ClusterShape {
                    consensus_plugin: "raft".into(),
                    consensus_mode: "solo".into(),
                    size: 4,
                },
            })
            .await
            .unwrap();

        let engine = LifecycleEngine::new(
            store.clone(),
            MockHosts { host: Some(host) },
            MockBackend,
            30000,
        );

        recycle(engine.clone(), released.clone()).await;

        assert!(store.deleted.lock().unwrap().contains(&released.id));
        // A fresh cluster exists sharing name/host_id but a different id.
        let remaining = store.active.lock().unwrap();
        assert_eq!(remaining.len(), 1);
        let recreated = remaining.values().next().unwrap();
        assert_ne!(recreated.id, released.id);
        assert_eq!(recreated.name, "c1");
    }
}
