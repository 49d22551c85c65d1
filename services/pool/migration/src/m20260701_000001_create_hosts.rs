use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Hosts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Hosts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Hosts::DaemonUrl).string().not_null())
                    .col(ColumnDef::new(Hosts::Status).string().not_null())
                    .col(ColumnDef::new(Hosts::Capacity).integer().not_null())
                    .col(
                        ColumnDef::new(Hosts::Clusters)
                            .array(ColumnType::String(StringLen::None))
                            .not_null()
                            .default(Expr::cust("ARRAY[]::varchar[]")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Hosts::Table)
                    .col(Hosts::Status)
                    .name("idx_hosts_status")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Hosts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Hosts {
    Table,
    Id,
    DaemonUrl,
    Status,
    Capacity,
    Clusters,
}
