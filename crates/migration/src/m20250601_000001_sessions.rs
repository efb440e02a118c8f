//! Chat sessions and per-user dialog state.
//!
//! - `user_sessions`: one row per Telegram user holding the remote token pair
//! - `dialog_states`: one row per Telegram user with an active multi-turn flow

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum UserSessions {
    Table,
    TelegramId,
    UserId,
    TenantId,
    AccessToken,
    RefreshToken,
    AccessExpiresAt,
    RefreshExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum DialogStates {
    Table,
    TelegramId,
    State,
    DraftId,
    Context,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserSessions::TelegramId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserSessions::UserId).string().not_null())
                    .col(ColumnDef::new(UserSessions::TenantId).string().not_null())
                    .col(ColumnDef::new(UserSessions::AccessToken).string().not_null())
                    .col(ColumnDef::new(UserSessions::RefreshToken).string().not_null())
                    .col(
                        ColumnDef::new(UserSessions::AccessExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSessions::RefreshExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserSessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DialogStates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DialogStates::TelegramId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DialogStates::State).string().not_null())
                    .col(ColumnDef::new(DialogStates::DraftId).string())
                    .col(
                        ColumnDef::new(DialogStates::Context)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(DialogStates::UpdatedAt)
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
            .drop_table(Table::drop().table(DialogStates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserSessions::Table).to_owned())
            .await?;
        Ok(())
    }
}
