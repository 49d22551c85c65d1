use sea_orm::entity::prelude::*;

/// Lifecycle state of a cluster record.
///
/// Reified as an explicit column rather than overloading `user_id` with the
/// `__NOT_READY_FOR_APPLY__` sentinel, so `apply`'s claim predicate can never
/// accidentally match a still-provisioning cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ClusterStatus {
    #[sea_orm(string_value = "provisioning")]
    Provisioning,
    #[sea_orm(string_value = "idle")]
    Idle,
    #[sea_orm(string_value = "leased")]
    Leased,
    #[sea_orm(string_value = "releasing")]
    Releasing,
}

/// A live (provisioning, idle, leased, or releasing) cluster.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "active_clusters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub host_id: String,
    pub api_url: String,
    /// `""` (idle), `__NOT_READY_FOR_APPLY__` (provisioning), or a real user id.
    /// Kept in sync with `status` on every write; retained verbatim because
    /// it is part of the external projection.
    pub user_id: String,
    pub status: ClusterStatus,
    pub consensus_plugin: String,
    pub consensus_mode: String,
    pub size: i32,
    #[sea_orm(column_type = "Array(StringLen::None)")]
    pub node_containers: Vec<String>,
    pub create_ts: chrono::DateTime<chrono::Utc>,
    pub apply_ts: Option<chrono::DateTime<chrono::Utc>>,
    pub release_ts: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
