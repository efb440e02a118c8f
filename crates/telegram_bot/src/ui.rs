use api_types::{
    Currency, TransactionType,
    category::Category,
    report::{MonthlySummary, SummaryItem},
    tenant::Membership,
    transaction::TransactionView,
};
use chrono_tz::Tz;
use serde::Serialize;
use store::{CategoryMapping, UserPreferences, UserSession};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::commands::category_callback;

/// `minor/100` with two decimals, e.g. `1234.50`.
pub(crate) fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

pub(crate) fn format_money(minor: i64, currency: &str) -> String {
    format!("{} {currency}", format_amount(minor))
}

fn type_sign(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Income => "+",
        TransactionType::Expense => "-",
    }
}

pub(crate) fn category_label(category: &Category) -> String {
    if category.emoji.is_empty() {
        category.name.clone()
    } else {
        format!("{} {}", category.emoji, category.name)
    }
}

pub(crate) fn render_stats(period: &str, summary: &MonthlySummary) -> String {
    format!(
        "Статистика {period}\nДоход: {}\nРасход: {}",
        format_money(summary.total_income_minor, &summary.currency),
        format_money(summary.total_expense_minor, &summary.currency),
    )
}

/// Expense items, biggest first.
pub(crate) fn top_expenses(summary: &MonthlySummary, limit: usize) -> Vec<&SummaryItem> {
    let mut items: Vec<&SummaryItem> = summary
        .items
        .iter()
        .filter(|i| i.kind == TransactionType::Expense)
        .collect();
    items.sort_by(|a, b| b.total_minor.cmp(&a.total_minor));
    items.truncate(limit);
    items
}

pub(crate) fn render_top(period: &str, items: &[&SummaryItem], currency: &str) -> String {
    let mut text = format!("Топ категорий {period}:\n");
    for (idx, item) in items.iter().enumerate() {
        text.push_str(&format!(
            "{}) {} — {}\n",
            idx + 1,
            item.name,
            format_money(item.total_minor, currency)
        ));
    }
    text
}

/// A transaction plus its amount in the user's default currency when that
/// differs from the transaction currency.
pub(crate) struct RecentLine<'a> {
    pub tx: &'a TransactionView,
    pub converted: Option<(i64, Currency)>,
}

pub(crate) fn render_recent(lines: &[RecentLine<'_>]) -> String {
    let mut text = String::from("Последние транзакции:\n");
    for line in lines {
        let tx = line.tx;
        text.push_str(&format!(
            "- {}{} {}",
            type_sign(tx.kind),
            format_amount(tx.amount_minor),
            tx.currency
        ));
        if let Some((minor, currency)) = line.converted {
            text.push_str(&format!(" (≈ {})", format_money(minor, currency.code())));
        }
        if !tx.comment.is_empty() {
            text.push(' ');
            text.push_str(&tx.comment);
        }
        text.push('\n');
    }
    text
}

#[derive(Serialize)]
struct ExportRow {
    date: String,
    #[serde(rename = "type")]
    kind: &'static str,
    amount: String,
    currency: String,
    category_id: String,
    comment: String,
}

pub(crate) fn render_export_csv(
    transactions: &[TransactionView],
    tz: Tz,
) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for tx in transactions {
        writer.serialize(ExportRow {
            date: tx.occurred_at.with_timezone(&tz).format("%Y-%m-%d").to_string(),
            kind: tx.kind.as_str(),
            amount: format_amount(tx.amount_minor),
            currency: tx.currency.clone(),
            category_id: tx.category_id.clone(),
            comment: tx.comment.replace(',', " "),
        })?;
    }
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

pub(crate) fn render_categories(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "Категорий нет".to_string();
    }
    let mut text = String::from("Категории:\n");
    for category in categories {
        text.push_str(&format!("{} ({})\n", category_label(category), category.id));
    }
    text
}

pub(crate) fn render_mappings(mappings: &[CategoryMapping], categories: &[Category]) -> String {
    let mut text = String::from("Сопоставления:\n");
    for mapping in mappings {
        let target = categories
            .iter()
            .find(|c| c.id == mapping.category_id)
            .map_or(mapping.category_id.as_str(), |c| c.name.as_str());
        text.push_str(&format!("{} = {}\n", mapping.keyword, target));
    }
    text
}

pub(crate) fn render_profile(
    session: Option<&UserSession>,
    prefs: Option<&UserPreferences>,
) -> String {
    let mut text = String::from("Профиль:\n");
    match session {
        Some(s) => text.push_str(&format!("UserID: {}\nTenantID: {}\n", s.user_id, s.tenant_id)),
        None => text.push_str("Не авторизован\n"),
    }
    let language = prefs
        .map(|p| p.language.as_str())
        .filter(|l| !l.is_empty())
        .unwrap_or("-");
    let currency = prefs
        .and_then(|p| p.default_currency)
        .map_or("-", |c| c.code());
    text.push_str(&format!(
        "Язык: {language}\nВалюта по умолчанию: {currency}\n"
    ));
    text
}

pub(crate) fn saved_text(
    kind: TransactionType,
    amount_minor: i64,
    currency: Currency,
    description: &str,
    category: &str,
) -> String {
    format!(
        "✅ Сохранено: {} {} {} — {} (категория: {})",
        kind,
        format_amount(amount_minor),
        currency,
        description,
        category
    )
}

pub(crate) fn recognized_text(
    kind: TransactionType,
    amount_minor: i64,
    currency: Currency,
    description: &str,
) -> String {
    format!(
        "Распознано: {} {} {} — {}",
        kind,
        format_amount(amount_minor),
        currency,
        description
    )
}

/// One button per category; long ids go through the operation `op_id`.
pub(crate) fn category_keyboard(categories: &[Category], op_id: &str) -> InlineKeyboardMarkup {
    let rows = categories
        .iter()
        .enumerate()
        .map(|(idx, category)| {
            vec![InlineKeyboardButton::callback(
                category_label(category),
                category_callback(&category.id, op_id, idx),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

pub(crate) fn confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Да", "confirm:yes"),
        InlineKeyboardButton::callback("❌ Нет", "confirm:no"),
    ]])
}

pub(crate) fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🇷🇺 Русский", "lang:ru"),
        InlineKeyboardButton::callback("🇺🇸 English", "lang:en"),
    ]])
}

pub(crate) fn currency_keyboard() -> InlineKeyboardMarkup {
    let row = Currency::ALL
        .iter()
        .map(|c| {
            InlineKeyboardButton::callback(
                format!("{} {}", c.symbol(), c.code()),
                format!("cur:{}", c.code()),
            )
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

pub(crate) fn tenant_keyboard(tenants: &[Membership]) -> InlineKeyboardMarkup {
    let rows = tenants
        .iter()
        .map(|t| {
            vec![InlineKeyboardButton::callback(
                format!("{} ({})", t.name, t.role),
                format!("tenant:{}", t.tenant_id),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

pub(crate) fn help_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🔐 Аутентификация", "help:auth"),
            InlineKeyboardButton::callback("💰 Транзакции", "help:transactions"),
        ],
        vec![
            InlineKeyboardButton::callback("🏷️ Категории", "help:categories"),
            InlineKeyboardButton::callback("📊 Статистика", "help:stats"),
        ],
        vec![
            InlineKeyboardButton::callback("⚙️ Настройки", "help:settings"),
            InlineKeyboardButton::callback("👨‍💼 Админ", "help:admin"),
        ],
    ])
}

pub(crate) fn back_to_help_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "⬅️ Назад к справке",
        "help:",
    )]])
}

pub(crate) fn main_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new("/stats"),
            KeyboardButton::new("/recent"),
            KeyboardButton::new("/top_categories"),
        ],
        vec![
            KeyboardButton::new("/categories"),
            KeyboardButton::new("/profile"),
            KeyboardButton::new("/help"),
        ],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use teloxide::types::InlineKeyboardButtonKind;

    fn category(id: &str, name: &str, emoji: &str) -> Category {
        Category {
            id: id.to_string(),
            code: String::new(),
            name: name.to_string(),
            emoji: emoji.to_string(),
            kind: Some(TransactionType::Expense),
            active: true,
        }
    }

    fn callback_data(kb: &InlineKeyboardMarkup) -> Vec<String> {
        kb.inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn money_has_two_decimals() {
        assert_eq!(format_money(123_450, "RUB"), "1234.50 RUB");
        assert_eq!(format_money(5, "USD"), "0.05 USD");
        assert_eq!(format_money(-1999, "EUR"), "-19.99 EUR");
    }

    #[test]
    fn stats_block_has_three_lines() {
        let summary = MonthlySummary {
            items: vec![],
            total_income_minor: 5_000_000,
            total_expense_minor: 123_456,
            currency: "RUB".to_string(),
        };
        assert_eq!(
            render_stats("2025-03", &summary),
            "Статистика 2025-03\nДоход: 50000.00 RUB\nРасход: 1234.56 RUB"
        );
    }

    #[test]
    fn top_keeps_biggest_expenses() {
        let item = |name: &str, kind, total| SummaryItem {
            category_id: name.to_string(),
            name: name.to_string(),
            kind,
            total_minor: total,
        };
        let summary = MonthlySummary {
            items: vec![
                item("a", TransactionType::Expense, 100),
                item("salary", TransactionType::Income, 10_000),
                item("b", TransactionType::Expense, 300),
                item("c", TransactionType::Expense, 200),
            ],
            total_income_minor: 10_000,
            total_expense_minor: 600,
            currency: "RUB".to_string(),
        };
        let names: Vec<_> = top_expenses(&summary, 2)
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, ["b", "c"]);
    }

    #[test]
    fn category_keyboard_respects_callback_limit() {
        let long_id = "c".repeat(70);
        let kb = category_keyboard(
            &[category("food", "Еда", "🍔"), category(&long_id, "Длинная", "")],
            "0123456789abcdef0123456789abcdef",
        );
        let data = callback_data(&kb);
        assert_eq!(data[0], "cat:food");
        assert_eq!(data[1], "cat:@0123456789abcdef0123456789abcdef:1");
        assert!(data.iter().all(|d| d.len() <= 64));
        assert_eq!(kb.inline_keyboard[0][0].text, "🍔 Еда");
        assert_eq!(kb.inline_keyboard[1][0].text, "Длинная");
    }

    #[test]
    fn fixed_keyboards() {
        assert_eq!(callback_data(&confirm_keyboard()), ["confirm:yes", "confirm:no"]);
        assert_eq!(
            callback_data(&currency_keyboard()),
            ["cur:RUB", "cur:USD", "cur:EUR", "cur:GBP", "cur:JPY"]
        );
        assert_eq!(callback_data(&language_keyboard()), ["lang:ru", "lang:en"]);
    }

    #[test]
    fn export_csv_layout() {
        let tx = TransactionView {
            id: "t1".to_string(),
            kind: TransactionType::Expense,
            amount_minor: 45_000,
            currency: "RUB".to_string(),
            category_id: "transport".to_string(),
            comment: "такси, ночь".to_string(),
            occurred_at: Utc.with_ymd_and_hms(2025, 3, 1, 21, 30, 0).unwrap(),
        };
        let data = render_export_csv(&[tx], chrono_tz::Europe::Moscow).unwrap();
        let text = String::from_utf8(data).unwrap();
        assert_eq!(
            text,
            "date,type,amount,currency,category_id,comment\n2025-03-02,expense,450.00,RUB,transport,такси  ночь\n"
        );
    }

    #[test]
    fn recent_shows_conversion() {
        let tx = TransactionView {
            id: "t1".to_string(),
            kind: TransactionType::Income,
            amount_minor: 1000,
            currency: "USD".to_string(),
            category_id: String::new(),
            comment: "долг".to_string(),
            occurred_at: Utc::now(),
        };
        let text = render_recent(&[RecentLine {
            tx: &tx,
            converted: Some((90_000, Currency::Rub)),
        }]);
        assert_eq!(
            text,
            "Последние транзакции:\n- +10.00 USD (≈ 900.00 RUB) долг\n"
        );
    }
}
