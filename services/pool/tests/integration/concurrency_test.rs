//! Exercises the two atomicity guarantees a mocked `ClusterStore`/
//! `HostRegistry` cannot honestly demonstrate: two real Postgres
//! transactions racing the same row. Requires `DATABASE_URL`.

use fleetpool_pool::domain::repository::{ClusterStore, HostRegistry};
use fleetpool_pool::domain::types::{ClusterCondition, ClusterShape, NewCluster};
use fleetpool_pool::infra::db::{DbClusterStore, DbHostRegistry};

use crate::helpers::{insert_host, test_db, truncate_all};

/// Two concurrent `claim_idle` calls against the same idle cluster must not
/// both succeed — the `SELECT ... FOR UPDATE` row lock serializes them and
/// the loser sees no match once the winner's row is no longer idle.
#[tokio::test]
async fn should_allow_only_one_concurrent_claim_idle_to_win() {
    let db = test_db().await;
    truncate_all(&db).await;

    let host = insert_host(&db, "race-host-1", 4).await;
    let store = DbClusterStore { db: db.clone() };

    let cluster = store
        .insert_active(NewCluster {
            name: "race-cluster".into(),
            host_id: host.id.clone(),
            api_url: "http://10.0.0.1:30000".into(),
            user_id: String::new(),
            shape: ClusterShape {
                consensus_plugin: "raft".into(),
                consensus_mode: "solo".into(),
                size: 4,
            },
        })
        .await
        .unwrap();
    // insert_active leaves status = Provisioning; force it idle for this test.
    store
        .update_active(
            cluster.id,
            fleetpool_pool::domain::repository::ActiveClusterPatch {
                status: Some(fleetpool_pool::domain::types::ClusterStatus::Idle),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let condition = ClusterCondition::default();
    let (a, b) = tokio::join!(
        store.claim_idle(&host.id, &condition, "user-a"),
        store.claim_idle(&host.id, &condition, "user-b"),
    );

    let winners = [a.unwrap(), b.unwrap()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    assert_eq!(winners.len(), 1, "exactly one claim should have won the race");
}

/// Two concurrent `attach_cluster` calls on a host with exactly one
/// remaining slot must not both succeed — the capacity-guarded
/// `array_append` UPDATE is atomic, so only one commits.
#[tokio::test]
async fn should_enforce_capacity_under_concurrent_attach() {
    let db = test_db().await;
    truncate_all(&db).await;

    let host = insert_host(&db, "race-host-2", 1).await;
    let registry = DbHostRegistry { db: db.clone() };

    let id_a = fleetpool_domain::id::ClusterId(uuid::Uuid::now_v7());
    let id_b = fleetpool_domain::id::ClusterId(uuid::Uuid::now_v7());

    let (a, b) = tokio::join!(
        registry.attach_cluster(&host.id, id_a),
        registry.attach_cluster(&host.id, id_b),
    );

    let attached = [a.unwrap(), b.unwrap()].into_iter().filter(|ok| *ok).count();
    assert_eq!(attached, 1, "only one attach should have succeeded at capacity 1");

    let refreshed = registry.get(&host.id).await.unwrap().unwrap();
    assert_eq!(refreshed.clusters.len(), 1);
}

/// `mark_releasing` called twice for the same cluster (e.g. a retried
/// client request) must archive/recycle at most once.
#[tokio::test]
async fn should_mark_releasing_at_most_once() {
    let db = test_db().await;
    truncate_all(&db).await;

    let host = insert_host(&db, "race-host-3", 4).await;
    let store = DbClusterStore { db: db.clone() };

    let cluster = store
        .insert_active(NewCluster {
            name: "leased-cluster".into(),
            host_id: host.id.clone(),
            api_url: "http://10.0.0.1:30001".into(),
            user_id: "user-a".into(),
            shape: ClusterShape::default(),
        })
        .await
        .unwrap();
    store
        .update_active(
            cluster.id,
            fleetpool_pool::domain::repository::ActiveClusterPatch {
                status: Some(fleetpool_pool::domain::types::ClusterStatus::Leased),
                user_id: Some("user-a".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let selector_a = fleetpool_pool::domain::repository::ReleaseSelector::ByClusterId(cluster.id);
    let selector_b = fleetpool_pool::domain::repository::ReleaseSelector::ByClusterId(cluster.id);

    let (a, b) = tokio::join!(store.mark_releasing(selector_a), store.mark_releasing(selector_b));

    let released = [a.unwrap(), b.unwrap()].into_iter().flatten().count();
    assert_eq!(released, 1, "mark_releasing should succeed exactly once");
}

