pub use sea_orm_migration::prelude::*;

mod m20250601_000001_sessions;
mod m20250601_000002_category_mappings;
mod m20250601_000003_preferences;
mod m20250601_000004_drafts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_sessions::Migration),
            Box::new(m20250601_000002_category_mappings::Migration),
            Box::new(m20250601_000003_preferences::Migration),
            Box::new(m20250601_000004_drafts::Migration),
        ]
    }
}
