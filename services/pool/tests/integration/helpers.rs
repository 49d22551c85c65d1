use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use fleetpool_pool::domain::repository::HostRegistry;
use fleetpool_pool::domain::types::Host;
use fleetpool_pool::infra::db::DbHostRegistry;
use fleetpool_pool_migration::Migrator;

/// Connects to `DATABASE_URL`, runs migrations, and returns a fresh connection.
///
/// Panics with a clear message if `DATABASE_URL` is unset; run this binary as
/// `DATABASE_URL=postgres://... cargo test --test integration`. Every test
/// using this truncates its own rows at the start rather than relying on
/// isolation between tests, since migrations run once per process and the
/// schema is shared.
pub async fn test_db() -> DatabaseConnection {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run services/pool integration tests");
    let db = Database::connect(&url)
        .await
        .expect("failed to connect to test database");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");
    db
}

pub async fn truncate_all(db: &DatabaseConnection) {
    use sea_orm::{ConnectionTrait, DbBackend, Statement};
    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "TRUNCATE active_clusters, released_clusters, hosts CASCADE",
    ))
    .await
    .expect("failed to truncate test tables");
}

pub async fn insert_host(db: &DatabaseConnection, id: &str, capacity: i32) -> Host {
    let registry = DbHostRegistry { db: db.clone() };
    insert_host_row(db, id, capacity).await;
    registry
        .get(&fleetpool_domain::id::HostId(id.to_owned()))
        .await
        .unwrap()
        .expect("host row should exist after insert")
}

async fn insert_host_row(db: &DatabaseConnection, id: &str, capacity: i32) {
    use sea_orm::{ConnectionTrait, DbBackend, Statement};
    db.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "INSERT INTO hosts (id, daemon_url, status, capacity, clusters) \
         VALUES ($1, $2, 'active', $3, ARRAY[]::varchar[])",
        [
            id.to_owned().into(),
            "tcp://10.0.0.1:2376".to_owned().into(),
            capacity.into(),
        ],
    ))
    .await
    .expect("failed to insert test host");
}
