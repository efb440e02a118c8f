use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum CategoryMappings {
    Table,
    Id,
    TenantId,
    Keyword,
    CategoryId,
    Priority,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CategoryMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CategoryMappings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CategoryMappings::TenantId).string().not_null())
                    .col(ColumnDef::new(CategoryMappings::Keyword).string().not_null())
                    .col(ColumnDef::new(CategoryMappings::CategoryId).string().not_null())
                    .col(
                        ColumnDef::new(CategoryMappings::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CategoryMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Keywords are stored lowercased, so this is case-insensitive in practice.
        manager
            .create_index(
                Index::create()
                    .name("idx-category_mappings-tenant_id-keyword-unique")
                    .table(CategoryMappings::Table)
                    .col(CategoryMappings::TenantId)
                    .col(CategoryMappings::Keyword)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CategoryMappings::Table).to_owned())
            .await
    }
}
