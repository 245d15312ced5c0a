//! Create dispute reason catalogue migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DisputeReason::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DisputeReason::Clave)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DisputeReason::Titulo).string_len(256).not_null())
                    .col(ColumnDef::new(DisputeReason::Categoria).string_len(16).not_null())
                    .col(ColumnDef::new(DisputeReason::Orden).integer().not_null().default(0))
                    .col(ColumnDef::new(DisputeReason::Activo).boolean().not_null().default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dispute_reason_categoria")
                    .table(DisputeReason::Table)
                    .col(DisputeReason::Categoria)
                    .col(DisputeReason::Orden)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DisputeReason::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DisputeReason {
    Table,
    Clave,
    Titulo,
    Categoria,
    Orden,
    Activo,
}
