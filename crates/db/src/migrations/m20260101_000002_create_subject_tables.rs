//! Create the order, campaign and application projections.

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
                    .table(ShopOrder::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ShopOrder::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(ShopOrder::BuyerId).string_len(32).not_null())
                    .col(ColumnDef::new(ShopOrder::SellerId).string_len(32).not_null())
                    .col(ColumnDef::new(ShopOrder::ShopId).string_len(32))
                    .col(
                        ColumnDef::new(ShopOrder::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shop_order_buyer")
                            .from(ShopOrder::Table, ShopOrder::BuyerId)
                            .to(User::Table, User::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shop_order_seller")
                            .from(ShopOrder::Table, ShopOrder::SellerId)
                            .to(User::Table, User::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Campaign::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Campaign::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Campaign::SellerId).string_len(32).not_null())
                    .col(ColumnDef::new(Campaign::ShopId).string_len(32))
                    .col(
                        ColumnDef::new(Campaign::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_seller")
                            .from(Campaign::Table, Campaign::SellerId)
                            .to(User::Table, User::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CampaignApplication::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampaignApplication::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CampaignApplication::CampaignId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(CampaignApplication::InfluencerId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignApplication::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_application_campaign")
                            .from(CampaignApplication::Table, CampaignApplication::CampaignId)
                            .to(Campaign::Table, Campaign::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_application_influencer")
                            .from(CampaignApplication::Table, CampaignApplication::InfluencerId)
                            .to(User::Table, User::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CampaignApplication::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Campaign::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ShopOrder::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ShopOrder {
    Table,
    Id,
    BuyerId,
    SellerId,
    ShopId,
    CreatedAt,
}

#[derive(Iden)]
enum Campaign {
    Table,
    Id,
    SellerId,
    ShopId,
    CreatedAt,
}

#[derive(Iden)]
enum CampaignApplication {
    Table,
    Id,
    CampaignId,
    InfluencerId,
    CreatedAt,
}
