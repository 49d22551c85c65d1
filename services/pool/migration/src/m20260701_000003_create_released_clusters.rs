use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReleasedClusters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReleasedClusters::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReleasedClusters::Name).string().not_null())
                    .col(ColumnDef::new(ReleasedClusters::HostId).string().not_null())
                    .col(ColumnDef::new(ReleasedClusters::ApiUrl).string().not_null())
                    .col(ColumnDef::new(ReleasedClusters::UserId).string().not_null())
                    .col(
                        ColumnDef::new(ReleasedClusters::Status)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReleasedClusters::ConsensusPlugin)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReleasedClusters::ConsensusMode)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReleasedClusters::Size).integer().not_null())
                    .col(
                        ColumnDef::new(ReleasedClusters::NodeContainers)
                            .array(ColumnType::String(StringLen::None))
                            .not_null()
                            .default(Expr::cust("ARRAY[]::varchar[]")),
                    )
                    .col(
                        ColumnDef::new(ReleasedClusters::CreateTs)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReleasedClusters::ApplyTs).timestamp_with_time_zone())
                    .col(ColumnDef::new(ReleasedClusters::ReleaseTs).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReleasedClusters::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ReleasedClusters {
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
