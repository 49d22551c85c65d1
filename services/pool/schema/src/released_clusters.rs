use sea_orm::entity::prelude::*;

use crate::active_clusters::ClusterStatus;

/// Archived copy of a cluster record after it has been torn down.
/// Mirrors `active_clusters` field-for-field so archiving is a straight copy.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "released_clusters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub host_id: String,
    pub api_url: String,
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
