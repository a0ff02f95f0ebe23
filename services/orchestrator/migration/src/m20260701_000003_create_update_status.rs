use sea_orm_migration::prelude::*;

use crate::m20260701_000001_create_hosts::Hosts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UpdateStatus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UpdateStatus::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UpdateStatus::HostId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UpdateStatus::Image).string().not_null())
                    .col(
                        ColumnDef::new(UpdateStatus::Stage)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UpdateStatus::Logs)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(UpdateStatus::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(UpdateStatus::Table, UpdateStatus::HostId)
                            .to(Hosts::Table, Hosts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UpdateStatus::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UpdateStatus {
    Table,
    Id,
    HostId,
    Image,
    Stage,
    Logs,
    CreatedAt,
}
