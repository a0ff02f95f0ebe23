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
                    .table(Containers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Containers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Containers::HostId).big_integer().not_null())
                    .col(ColumnDef::new(Containers::ContainerUid).string().not_null())
                    .col(ColumnDef::new(Containers::Name).string().not_null())
                    .col(ColumnDef::new(Containers::Image).string().not_null())
                    .col(
                        ColumnDef::new(Containers::Digest)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Containers::Ports)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Containers::EnvVars)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Containers::Volumes)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Containers::Network).string().null())
                    .col(
                        ColumnDef::new(Containers::Watch)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Containers::Table, Containers::HostId)
                            .to(Hosts::Table, Hosts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_containers_host_uid")
                    .table(Containers::Table)
                    .col(Containers::HostId)
                    .col(Containers::ContainerUid)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Containers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Containers {
    Table,
    Id,
    HostId,
    ContainerUid,
    Name,
    Image,
    Digest,
    Ports,
    EnvVars,
    Volumes,
    Network,
    Watch,
}
