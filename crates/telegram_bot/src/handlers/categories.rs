use api_types::{
    TransactionType,
    category::{Category, CategoryDelete, CategoryNew, CategoryRename},
};

use super::Dispatcher;
use crate::{error::BotError, ui};

const MAP_USAGE: &str = "Использование:\n/map <слово> = <категория> — сохранить\n/map <слово> — показать\n/map --all — показать все";
const UNMAP_USAGE: &str = "Удалить сопоставление: /unmap <слово>";

/// Splits `<head> <rest>`, both non-empty.
fn split_pair(args: &str) -> Option<(&str, &str)> {
    let (head, rest) = args.trim().split_once(char::is_whitespace)?;
    let rest = rest.trim();
    (!head.is_empty() && !rest.is_empty()).then_some((head, rest))
}

fn find_by_name<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    let wanted = name.trim().to_lowercase();
    categories
        .iter()
        .find(|c| c.name.to_lowercase() == wanted)
        .or_else(|| categories.iter().find(|c| c.id == name.trim()))
}

impl Dispatcher {
    pub(super) async fn categories(&self, telegram_id: i64, chat_id: i64) -> Result<(), BotError> {
        let session = self.session(telegram_id).await?;
        let categories = self
            .resolver
            .categories(
                &session.access_token,
                &session.tenant_id,
                telegram_id,
                Some(TransactionType::Expense),
            )
            .await?;
        self.send(chat_id, &ui::render_categories(&categories)).await;
        Ok(())
    }

    pub(super) async fn create_category(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let Some((code, name)) = split_pair(args) else {
            return Err(BotError::InvalidArgument(
                "Использование: /create_category <код> <название>".to_string(),
            ));
        };
        let session = self.session(telegram_id).await?;
        let locale = self.resolver.locale(telegram_id).await?;
        let category = self
            .finance
            .create_category(
                &session.access_token,
                &CategoryNew {
                    tenant_id: session.tenant_id.clone(),
                    code: code.to_string(),
                    name: name.to_string(),
                    locale,
                },
            )
            .await?;
        self.send(
            chat_id,
            &format!(
                "Категория создана: {} ({})",
                ui::category_label(&category),
                category.id
            ),
        )
        .await;
        Ok(())
    }

    pub(super) async fn rename_category(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let Some((id, name)) = split_pair(args) else {
            return Err(BotError::InvalidArgument(
                "Использование: /rename_category <id> <новое название>".to_string(),
            ));
        };
        let session = self.session(telegram_id).await?;
        let locale = self.resolver.locale(telegram_id).await?;
        let category = self
            .finance
            .rename_category(
                &session.access_token,
                &CategoryRename {
                    tenant_id: session.tenant_id.clone(),
                    id: id.to_string(),
                    name: name.to_string(),
                    locale,
                },
            )
            .await?;
        self.send(
            chat_id,
            &format!("Категория переименована: {}", ui::category_label(&category)),
        )
        .await;
        Ok(())
    }

    pub(super) async fn delete_category(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let id = args.trim();
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(BotError::InvalidArgument(
                "Использование: /delete_category <id>".to_string(),
            ));
        }
        let session = self.session(telegram_id).await?;
        self.finance
            .delete_category(
                &session.access_token,
                &CategoryDelete {
                    tenant_id: session.tenant_id.clone(),
                    id: id.to_string(),
                },
            )
            .await?;
        self.send(chat_id, "Категория удалена.").await;
        Ok(())
    }

    pub(super) async fn map(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let args = args.trim();
        if args.is_empty() {
            self.send(chat_id, MAP_USAGE).await;
            return Ok(());
        }
        let session = self.session(telegram_id).await?;

        if args == "--all" {
            return self.list_mappings(telegram_id, chat_id, &session, None).await;
        }

        let Some((keyword, name)) = args.split_once('=') else {
            let mapping = self.store.find_mapping(&session.tenant_id, args).await?;
            let text = match mapping {
                Some(mapping) => {
                    let categories = self
                        .resolver
                        .categories(&session.access_token, &session.tenant_id, telegram_id, None)
                        .await?;
                    ui::render_mappings(&[mapping], &categories)
                }
                None => format!("Сопоставление для «{args}» не найдено."),
            };
            self.send(chat_id, &text).await;
            return Ok(());
        };

        let (keyword, name) = (keyword.trim(), name.trim());
        if keyword.is_empty() || name.is_empty() {
            self.send(chat_id, MAP_USAGE).await;
            return Ok(());
        }
        let categories = self
            .resolver
            .categories(&session.access_token, &session.tenant_id, telegram_id, None)
            .await?;
        let Some(category) = find_by_name(&categories, name) else {
            return Err(BotError::InvalidArgument(format!(
                "Категория «{name}» не найдена. Список: /categories"
            )));
        };
        let mapping = self
            .store
            .add_mapping(&session.tenant_id, keyword, &category.id, 0)
            .await?;
        tracing::info!(
            telegram_id,
            keyword = %mapping.keyword,
            category_id = %mapping.category_id,
            "Mapping saved"
        );
        self.send(
            chat_id,
            &format!("Сопоставление сохранено: {} = {}", mapping.keyword, category.name),
        )
        .await;
        Ok(())
    }

    pub(super) async fn unmap(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let session = self.session(telegram_id).await?;
        let keyword = args.trim();
        if keyword.is_empty() {
            return self
                .list_mappings(telegram_id, chat_id, &session, Some(UNMAP_USAGE))
                .await;
        }
        let text = if self.store.remove_mapping(&session.tenant_id, keyword).await? {
            format!("Сопоставление «{keyword}» удалено.")
        } else {
            format!("Сопоставление для «{keyword}» не найдено.")
        };
        self.send(chat_id, &text).await;
        Ok(())
    }

    async fn list_mappings(
        &self,
        telegram_id: i64,
        chat_id: i64,
        session: &store::UserSession,
        footer: Option<&str>,
    ) -> Result<(), BotError> {
        let mappings = self.store.list_mappings(&session.tenant_id).await?;
        let mut text = if mappings.is_empty() {
            "Сопоставлений пока нет.\n".to_string()
        } else {
            let categories = self
                .resolver
                .categories(&session.access_token, &session.tenant_id, telegram_id, None)
                .await?;
            ui::render_mappings(&mappings, &categories)
        };
        if let Some(footer) = footer {
            text.push('\n');
            text.push_str(footer);
        }
        self.send(chat_id, text.trim_end()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::category;

    #[test]
    fn pairs_need_both_parts() {
        assert_eq!(split_pair("food  Еда и напитки"), Some(("food", "Еда и напитки")));
        assert_eq!(split_pair("food"), None);
        assert_eq!(split_pair("   "), None);
    }

    #[test]
    fn names_match_case_insensitively_or_by_id() {
        let categories = [
            category("food", "Еда", TransactionType::Expense),
            category("taxi", "Такси", TransactionType::Expense),
        ];
        assert_eq!(find_by_name(&categories, "еДА").unwrap().id, "food");
        assert_eq!(find_by_name(&categories, "taxi").unwrap().id, "taxi");
        assert!(find_by_name(&categories, "кино").is_none());
    }
}
