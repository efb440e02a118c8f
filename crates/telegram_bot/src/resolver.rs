//! Category resolution for parsed descriptions.
//!
//! Order: exact keyword, partial keyword, optional LLM suggestion, and
//! finally the tenant's category list for a manual pick. Keyword lookups
//! stay local; only the fallbacks call remote services.

use std::{cmp::Reverse, sync::Arc};

use api_types::{TransactionType, category::{Category, CategoryList}};
use store::{CategoryMapping, Store, normalize_keyword};

use crate::{
    api::FinanceApi,
    error::BotError,
    llm::{LlmClassifier, Suggestion},
};

pub(crate) const DEFAULT_LOCALE: &str = "ru";

#[derive(Clone, Debug, Default)]
pub(crate) struct Resolution {
    pub matched: Option<CategoryMapping>,
    pub suggestion: Option<Suggestion>,
    pub candidates: Vec<Category>,
}

/// Lowercased, NFC, surrounding punctuation removed.
pub(crate) fn tokens(description: &str) -> Vec<String> {
    description
        .split_whitespace()
        .map(|t| normalize_keyword(t.trim_matches(|c: char| !c.is_alphanumeric())))
        .filter(|t| !t.is_empty())
        .collect()
}

/// First token of a description, used to learn a mapping after a manual pick.
pub(crate) fn head_token(description: &str) -> Option<String> {
    tokens(description).into_iter().next()
}

/// An exact token hit wins regardless of priority. Otherwise the mapping
/// with the highest priority whose keyword occurs in the description, the
/// oldest one on ties.
pub(crate) fn best_mapping<'a>(
    mappings: &'a [CategoryMapping],
    description: &str,
) -> Option<&'a CategoryMapping> {
    for token in tokens(description) {
        if let Some(hit) = mappings.iter().find(|m| m.keyword == token) {
            return Some(hit);
        }
    }

    let haystack = normalize_keyword(description);
    mappings
        .iter()
        .filter(|m| !m.keyword.is_empty() && haystack.contains(m.keyword.as_str()))
        .max_by_key(|m| (m.priority, Reverse(m.id)))
}

pub(crate) struct CategoryResolver {
    store: Store,
    finance: Arc<dyn FinanceApi>,
    llm: Option<LlmClassifier>,
}

impl CategoryResolver {
    pub(crate) fn new(store: Store, finance: Arc<dyn FinanceApi>, llm: Option<LlmClassifier>) -> Self {
        Self {
            store,
            finance,
            llm,
        }
    }

    pub(crate) async fn locale(&self, telegram_id: i64) -> Result<String, BotError> {
        Ok(self
            .store
            .preferences(telegram_id)
            .await?
            .map(|p| p.language)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string()))
    }

    /// Active categories usable for `kind`; categories without a type fit both.
    pub(crate) async fn categories(
        &self,
        token: &str,
        tenant_id: &str,
        telegram_id: i64,
        kind: Option<TransactionType>,
    ) -> Result<Vec<Category>, BotError> {
        let locale = self.locale(telegram_id).await?;
        let categories = self
            .finance
            .list_categories(
                token,
                &CategoryList {
                    tenant_id: tenant_id.to_string(),
                    locale,
                    include_inactive: false,
                    kind: None,
                },
            )
            .await?;
        Ok(categories
            .into_iter()
            .filter(|c| c.active)
            .filter(|c| match (kind, c.kind) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            })
            .collect())
    }

    pub(crate) async fn resolve(
        &self,
        token: &str,
        tenant_id: &str,
        telegram_id: i64,
        kind: TransactionType,
        description: &str,
    ) -> Result<Resolution, BotError> {
        let mappings = self.store.list_mappings(tenant_id).await?;
        if let Some(hit) = best_mapping(&mappings, description) {
            tracing::debug!(
                telegram_id,
                keyword = %hit.keyword,
                category_id = %hit.category_id,
                "Keyword mapping matched"
            );
            return Ok(Resolution {
                matched: Some(hit.clone()),
                ..Resolution::default()
            });
        }

        let candidates = self
            .categories(token, tenant_id, telegram_id, Some(kind))
            .await?;

        let mut suggestion = None;
        if let Some(llm) = &self.llm
            && !candidates.is_empty()
            && !description.is_empty()
        {
            let locale = self.locale(telegram_id).await?;
            match llm.classify(description, kind, &locale, &candidates).await {
                Ok(s) => suggestion = Some(s),
                Err(err) => tracing::warn!(telegram_id, "Classifier unavailable: {err}"),
            }
        }

        Ok(Resolution {
            matched: None,
            suggestion,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFinance, memory_store};

    fn mapping(id: i64, keyword: &str, category_id: &str, priority: i32) -> CategoryMapping {
        CategoryMapping {
            id,
            tenant_id: "t".to_string(),
            keyword: keyword.to_string(),
            category_id: category_id.to_string(),
            priority,
        }
    }

    #[test]
    fn exact_token_beats_higher_priority_substring() {
        let mappings = [mapping(1, "такси", "T", 0), mapping(2, "так", "P", 10)];
        let hit = best_mapping(&mappings, "вечернее такси домой").unwrap();
        assert_eq!(hit.category_id, "T");
    }

    #[test]
    fn partial_matches_use_priority_then_age() {
        let mappings = [
            mapping(1, "кофе", "A", 1),
            mapping(2, "кофейн", "B", 5),
            mapping(3, "кофейня", "C", 5),
        ];
        assert_eq!(
            best_mapping(&mappings, "кофейнята").unwrap().category_id,
            "B"
        );
        assert!(best_mapping(&mappings, "чай").is_none());
    }

    #[test]
    fn tokens_drop_punctuation_and_case() {
        assert_eq!(tokens("Такси, домой!"), ["такси", "домой"]);
        assert_eq!(head_token("  Кофе с собой"), Some("кофе".to_string()));
        assert_eq!(head_token("..."), None);
    }

    #[tokio::test]
    async fn mapping_hit_skips_remote_listing() {
        let store = memory_store().await;
        store.add_mapping("tenant-1", "такси", "T", 0).await.unwrap();
        let finance = Arc::new(FakeFinance::default());
        let resolver = CategoryResolver::new(store, finance.clone(), None);

        let res = resolver
            .resolve("tok", "tenant-1", 1, TransactionType::Expense, "такси домой")
            .await
            .unwrap();
        assert_eq!(res.matched.unwrap().category_id, "T");
        assert_eq!(finance.call_count("list_categories"), 0);
    }

    #[tokio::test]
    async fn no_mapping_returns_candidates_for_the_type() {
        let store = memory_store().await;
        let finance = Arc::new(FakeFinance::default());
        let resolver = CategoryResolver::new(store, finance.clone(), None);

        let res = resolver
            .resolve("tok", "tenant-1", 1, TransactionType::Expense, "что-то")
            .await
            .unwrap();
        assert!(res.matched.is_none());
        assert!(!res.candidates.is_empty());
        assert!(
            res.candidates
                .iter()
                .all(|c| c.kind != Some(TransactionType::Income))
        );
        assert_eq!(finance.call_count("list_categories"), 1);
    }
}
