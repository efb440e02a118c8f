//! Keyword to category mappings, scoped by tenant.

use sea_orm::entity::prelude::*;
use unicode_normalization::UnicodeNormalization;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryMapping {
    /// Monotonic row id, doubles as insertion order.
    pub id: i64,
    pub tenant_id: String,
    pub keyword: String,
    pub category_id: String,
    pub priority: i32,
}

/// Canonical keyword form: trimmed, NFC, lowercase.
#[must_use]
pub fn normalize_keyword(value: &str) -> String {
    value.trim().nfc().collect::<String>().to_lowercase()
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "category_mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: String,
    pub keyword: String,
    pub category_id: String,
    pub priority: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for CategoryMapping {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            tenant_id: model.tenant_id,
            keyword: model.keyword,
            category_id: model.category_id,
            priority: model.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_lowercased_and_trimmed() {
        assert_eq!(normalize_keyword("  Такси "), "такси");
        assert_eq!(normalize_keyword("COFFEE"), "coffee");
    }

    #[test]
    fn decomposed_input_is_composed() {
        // "й" written as "и" + combining breve.
        assert_eq!(normalize_keyword("чаи\u{0306}"), "чай");
    }
}
