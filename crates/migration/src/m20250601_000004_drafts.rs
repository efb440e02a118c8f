//! Transaction drafts and the operation contexts that reference them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum TransactionDrafts {
    Table,
    Id,
    TelegramId,
    TxType,
    AmountMinor,
    Currency,
    Description,
    CategoryId,
    OccurredAt,
    CreatedAt,
}

#[derive(Iden)]
enum OperationContexts {
    Table,
    OpId,
    TelegramId,
    TenantId,
    DraftId,
    TransactionId,
    DescriptionOriginal,
    CategoryIdSelected,
    CategoryNameSelected,
    SelectionSource,
    TxType,
    AmountMinor,
    Currency,
    OccurredAt,
    CategoryList,
    CategoryListMessageId,
    ConfirmationMessageId,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TransactionDrafts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionDrafts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TransactionDrafts::TelegramId).big_integer().not_null())
                    .col(ColumnDef::new(TransactionDrafts::TxType).string().not_null())
                    .col(ColumnDef::new(TransactionDrafts::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(TransactionDrafts::Currency).string().not_null())
                    .col(ColumnDef::new(TransactionDrafts::Description).string().not_null())
                    .col(ColumnDef::new(TransactionDrafts::CategoryId).string())
                    .col(ColumnDef::new(TransactionDrafts::OccurredAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(TransactionDrafts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transaction_drafts-telegram_id")
                    .table(TransactionDrafts::Table)
                    .col(TransactionDrafts::TelegramId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OperationContexts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OperationContexts::OpId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OperationContexts::TelegramId).big_integer().not_null())
                    .col(ColumnDef::new(OperationContexts::TenantId).string().not_null())
                    .col(ColumnDef::new(OperationContexts::DraftId).string())
                    .col(ColumnDef::new(OperationContexts::TransactionId).string())
                    .col(
                        ColumnDef::new(OperationContexts::DescriptionOriginal)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OperationContexts::CategoryIdSelected).string())
                    .col(ColumnDef::new(OperationContexts::CategoryNameSelected).string())
                    .col(
                        ColumnDef::new(OperationContexts::SelectionSource)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OperationContexts::TxType).string().not_null())
                    .col(ColumnDef::new(OperationContexts::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(OperationContexts::Currency).string().not_null())
                    .col(ColumnDef::new(OperationContexts::OccurredAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(OperationContexts::CategoryList)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(OperationContexts::CategoryListMessageId).integer())
                    .col(ColumnDef::new(OperationContexts::ConfirmationMessageId).integer())
                    .col(
                        ColumnDef::new(OperationContexts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OperationContexts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OperationContexts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TransactionDrafts::Table).to_owned())
            .await?;
        Ok(())
    }
}
