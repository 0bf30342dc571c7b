//! Migration to create the change_events table.
//!
//! The composite unique index on (connection_id, event_id) is the authoritative
//! dedup guard; application-level existence checks only avoid wasted work.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChangeEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChangeEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChangeEvents::ConnectionId).uuid().not_null())
                    .col(ColumnDef::new(ChangeEvents::Source).text().not_null())
                    .col(ColumnDef::new(ChangeEvents::EventId).text().not_null())
                    .col(ColumnDef::new(ChangeEvents::Title).text().not_null())
                    .col(
                        ColumnDef::new(ChangeEvents::Description)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ChangeEvents::Author).text().not_null())
                    .col(
                        ColumnDef::new(ChangeEvents::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ChangeEvents::Url).text().not_null())
                    .col(ColumnDef::new(ChangeEvents::Status).text().not_null())
                    .col(ColumnDef::new(ChangeEvents::Metadata).json_binary().not_null())
                    .col(
                        ColumnDef::new(ChangeEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_change_events_connection_id")
                            .from(ChangeEvents::Table, ChangeEvents::ConnectionId)
                            .to(Connections::Table, Connections::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_change_events_connection_event")
                    .table(ChangeEvents::Table)
                    .col(ChangeEvents::ConnectionId)
                    .col(ChangeEvents::EventId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_change_events_source", ChangeEvents::Source),
            ("idx_change_events_timestamp", ChangeEvents::Timestamp),
            ("idx_change_events_author", ChangeEvents::Author),
            ("idx_change_events_status", ChangeEvents::Status),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(ChangeEvents::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_change_events_status",
            "idx_change_events_author",
            "idx_change_events_timestamp",
            "idx_change_events_source",
            "idx_change_events_connection_event",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }

        manager
            .drop_table(Table::drop().table(ChangeEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ChangeEvents {
    Table,
    Id,
    ConnectionId,
    Source,
    EventId,
    Title,
    Description,
    Author,
    Timestamp,
    Url,
    Status,
    Metadata,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Connections {
    Table,
    Id,
}
