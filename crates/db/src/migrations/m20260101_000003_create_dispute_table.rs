//! Create dispute table migration.

use sea_orm_migration::prelude::*;

use super::m20260101_000001_create_user_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Dispute::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Dispute::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Dispute::Context).string_len(16).not_null())
                    .col(ColumnDef::new(Dispute::BuyerId).string_len(32).not_null())
                    .col(ColumnDef::new(Dispute::SellerId).string_len(32).not_null())
                    .col(ColumnDef::new(Dispute::OrderId).string_len(32))
                    .col(ColumnDef::new(Dispute::CampaignId).string_len(32))
                    .col(ColumnDef::new(Dispute::ApplicationId).string_len(32))
                    .col(ColumnDef::new(Dispute::ProductId).string_len(32))
                    .col(ColumnDef::new(Dispute::ShopId).string_len(32))
                    .col(ColumnDef::new(Dispute::ReasonCode).string_len(64).not_null())
                    .col(ColumnDef::new(Dispute::InitialDescription).text().not_null())
                    .col(ColumnDef::new(Dispute::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Dispute::SlaHours).integer().not_null().default(72))
                    .col(ColumnDef::new(Dispute::CurrentDeadline).timestamp_with_time_zone())
                    .col(ColumnDef::new(Dispute::ClosureType).string_len(64))
                    .col(ColumnDef::new(Dispute::ProposalBuyerStatus).string_len(16))
                    .col(ColumnDef::new(Dispute::ProposalSellerStatus).string_len(16))
                    .col(ColumnDef::new(Dispute::ModeratorAssignedTo).string_len(32))
                    .col(ColumnDef::new(Dispute::ModeratorKey).string_len(128))
                    .col(ColumnDef::new(Dispute::Version).integer().not_null().default(0))
                    .col(ColumnDef::new(Dispute::SubjectKey).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Dispute::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Dispute::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dispute_buyer")
                            .from(Dispute::Table, Dispute::BuyerId)
                            .to(User::Table, User::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dispute_seller")
                            .from(Dispute::Table, Dispute::SellerId)
                            .to(User::Table, User::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dispute_moderator")
                            .from(Dispute::Table, Dispute::ModeratorAssignedTo)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // One dispute per (context, buyer, seller, subject)
        manager
            .create_index(
                Index::create()
                    .name("idx_dispute_subject_unique")
                    .table(Dispute::Table)
                    .col(Dispute::Context)
                    .col(Dispute::BuyerId)
                    .col(Dispute::SellerId)
                    .col(Dispute::SubjectKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dispute_seller_id")
                    .table(Dispute::Table)
                    .col(Dispute::SellerId)
                    .to_owned(),
            )
            .await?;

        // Dashboard filters and the expiry sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_dispute_status_deadline")
                    .table(Dispute::Table)
                    .col(Dispute::Status)
                    .col(Dispute::CurrentDeadline)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dispute_created_at")
                    .table(Dispute::Table)
                    .col(Dispute::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Dispute::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Dispute {
    Table,
    Id,
    Context,
    BuyerId,
    SellerId,
    OrderId,
    CampaignId,
    ApplicationId,
    ProductId,
    ShopId,
    ReasonCode,
    InitialDescription,
    Status,
    SlaHours,
    CurrentDeadline,
    ClosureType,
    ProposalBuyerStatus,
    ProposalSellerStatus,
    ModeratorAssignedTo,
    ModeratorKey,
    Version,
    SubjectKey,
    CreatedAt,
    UpdatedAt,
}
