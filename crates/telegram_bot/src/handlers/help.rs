use super::Dispatcher;
use crate::{error::BotError, transport::Keyboard, ui};

const GREETING: &str = "Привет! Я помогу вести учёт расходов и доходов.\n\
Отправьте сумму и описание, например «450 такси» или «+50000 зарплата».\n\
Для начала войдите: /login. Справка: /help";

const MAIN_HELP: &str = "Справка. Выберите раздел или используйте /help <раздел>:\n\
auth, transactions, categories, stats, settings, admin";

const AUTH_HELP: &str = "🔐 Аутентификация\n\
/login — вход по ссылке и коду\n\
/register — регистрация по email и паролю\n\
/logout — выход\n\
/switch_tenant — сменить пространство\n\
/cancel — отменить текущее действие";

const TRANSACTIONS_HELP: &str = "💰 Транзакции\n\
Отправьте сумму и описание: «450 такси», «+50000 зарплата 01.12», «вчера 12.5$ кофе».\n\
Без знака или с «-» это расход, с «+» доход.\n\
Валюта: ₽ $ € £ ¥ или RUB USD EUR GBP JPY.";

const CATEGORIES_HELP: &str = "🏷️ Категории\n\
/categories — список\n\
/create_category <код> <название>\n\
/rename_category <id> <название>\n\
/delete_category <id>\n\
/map <слово> = <категория>, /map <слово>, /map --all\n\
/unmap <слово>";

const STATS_HELP: &str = "📊 Статистика\n\
/stats [YYYY-MM|week]\n\
/top_categories [период] [лимит]\n\
/recent [лимит]\n\
/export [период] [лимит] — CSV файл";

const SETTINGS_HELP: &str = "⚙️ Настройки\n\
/language — язык категорий\n\
/currency — валюта по умолчанию\n\
/profile — профиль";

const ADMIN_HELP: &str = "👨‍💼 Админ\n\
Управление пространствами и участниками доступно в веб-интерфейсе.";

/// Section text by name or Russian alias.
pub(super) fn section(name: &str) -> Option<&'static str> {
    match name.trim().to_lowercase().as_str() {
        "auth" | "аутентификация" => Some(AUTH_HELP),
        "transactions" | "транзакции" => Some(TRANSACTIONS_HELP),
        "categories" | "категории" => Some(CATEGORIES_HELP),
        "stats" | "статистика" => Some(STATS_HELP),
        "settings" | "настройки" => Some(SETTINGS_HELP),
        "admin" | "админ" => Some(ADMIN_HELP),
        _ => None,
    }
}

impl Dispatcher {
    pub(super) async fn start(&self, chat_id: i64) -> Result<(), BotError> {
        self.send_with(chat_id, GREETING, Some(Keyboard::Reply(ui::main_menu())))
            .await;
        Ok(())
    }

    pub(super) async fn help(&self, chat_id: i64, name: &str) -> Result<(), BotError> {
        match section(name) {
            Some(text) => {
                self.send_inline(chat_id, text, ui::back_to_help_keyboard())
                    .await
            }
            None => {
                let text = if name.trim().is_empty() {
                    MAIN_HELP.to_string()
                } else {
                    format!("Раздел «{}» не найден.\n{MAIN_HELP}", name.trim())
                };
                self.send_inline(chat_id, &text, ui::help_keyboard()).await
            }
        };
        Ok(())
    }

    pub(super) async fn help_page(
        &self,
        chat_id: i64,
        message_id: Option<i32>,
        name: &str,
    ) -> Result<(), BotError> {
        match section(name) {
            Some(text) => {
                self.edit_or_send(chat_id, message_id, text, Some(ui::back_to_help_keyboard()))
                    .await
            }
            None => {
                self.edit_or_send(chat_id, message_id, MAIN_HELP, Some(ui::help_keyboard()))
                    .await
            }
        }
        Ok(())
    }
}
