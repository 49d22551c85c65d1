use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActiveClusters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActiveClusters::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActiveClusters::Name).string().not_null())
                    .col(ColumnDef::new(ActiveClusters::HostId).string().not_null())
                    .col(ColumnDef::new(ActiveClusters::ApiUrl).string().not_null())
                    .col(
                        ColumnDef::new(ActiveClusters::UserId)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(ActiveClusters::Status)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActiveClusters::ConsensusPlugin)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActiveClusters::ConsensusMode)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActiveClusters::Size).integer().not_null())
                    .col(
                        ColumnDef::new(ActiveClusters::NodeContainers)
                            .array(ColumnType::String(StringLen::None))
                            .not_null()
                            .default(Expr::cust("ARRAY[]::varchar[]")),
                    )
                    .col(
                        ColumnDef::new(ActiveClusters::CreateTs)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ActiveClusters::ApplyTs).timestamp_with_time_zone())
                    .col(ColumnDef::new(ActiveClusters::ReleaseTs).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ActiveClusters::Table, ActiveClusters::HostId)
                            .to(Hosts::Table, Hosts::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ActiveClusters::Table)
                    .col(ActiveClusters::HostId)
                    .name("idx_active_clusters_host_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ActiveClusters::Table)
                    .col(ActiveClusters::UserId)
                    .name("idx_active_clusters_user_id")
                    .to_owned(),
            )
            .await?;

        // Unique ports per host, enforced by the same guarantee apply/create
        // rely on: partial-index style is not portable across sea-orm-migration
        // targets, so the adapter's port allocator is the authoritative check
        // (see fleetpool-pool's engine::port_allocator); this index only
        // speeds up the allocator's "used ports on this host" scan.
        manager
            .create_index(
                Index::create()
                    .table(ActiveClusters::Table)
                    .col(ActiveClusters::HostId)
                    .col(ActiveClusters::ApiUrl)
                    .name("idx_active_clusters_host_api_url")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActiveClusters::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ActiveClusters {
    Table,
    Id,
    Name,
    HostId,
    ApiUrl,
    UserId,
    Status,
    ConsensusPlugin,
    ConsensusMode,
    Size,
    NodeContainers,
    CreateTs,
    ApplyTs,
    ReleaseTs,
}

#[derive(Iden)]
enum Hosts {
    Table,
    Id,
}
