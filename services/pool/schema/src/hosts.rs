use sea_orm::entity::prelude::*;

/// A container host registered with the pool.
///
/// `clusters` holds the ids (as strings) of every active cluster currently
/// attached to this host; mutated only via `array_append`/`array_remove` so
/// capacity checks and membership changes stay atomic under concurrent
/// `create`/`delete` calls.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "hosts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub daemon_url: String,
    pub status: String,
    pub capacity: i32,
    #[sea_orm(column_type = "Array(StringLen::None)")]
    pub clusters: Vec<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
