//! Create dispute message table migration.

use sea_orm_migration::prelude::*;

use super::m20260101_000001_create_user_table::User;
use super::m20260101_000003_create_dispute_table::Dispute;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DisputeMessage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DisputeMessage::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DisputeMessage::DisputeId).string_len(32).not_null())
                    .col(ColumnDef::new(DisputeMessage::AuthorRole).string_len(16).not_null())
                    .col(ColumnDef::new(DisputeMessage::AuthorId).string_len(32))
                    .col(ColumnDef::new(DisputeMessage::Text).text().not_null())
                    .col(
                        ColumnDef::new(DisputeMessage::Attachments)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(DisputeMessage::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dispute_message_dispute")
                            .from(DisputeMessage::Table, DisputeMessage::DisputeId)
                            .to(Dispute::Table, Dispute::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dispute_message_author")
                            .from(DisputeMessage::Table, DisputeMessage::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Thread reads are always (dispute_id, created_at)
        manager
            .create_index(
                Index::create()
                    .name("idx_dispute_message_dispute_created")
                    .table(DisputeMessage::Table)
                    .col(DisputeMessage::DisputeId)
                    .col(DisputeMessage::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DisputeMessage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DisputeMessage {
    Table,
    Id,
    DisputeId,
    AuthorRole,
    AuthorId,
    Text,
    Attachments,
    CreatedAt,
}
