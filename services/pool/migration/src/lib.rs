pub use sea_orm_migration::prelude::*;

mod m20260701_000001_create_hosts;
mod m20260701_000002_create_active_clusters;
mod m20260701_000003_create_released_clusters;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260701_000001_create_hosts::Migration),
            Box::new(m20260701_000002_create_active_clusters::Migration),
            Box::new(m20260701_000003_create_released_clusters::Migration),
        ]
    }
}
