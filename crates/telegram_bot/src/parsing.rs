//! Free-text transaction parser.
//!
//! Tokens are stripped left to right in a fixed order: relative date word,
//! numeric date, currency, amount. Whatever remains is the description.

use std::sync::LazyLock;

use api_types::{Currency, TransactionType};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

#[allow(clippy::expect_used)]
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[./](\d{1,2})(?:[./](\d{2,4}))?\b").expect("date regex")
});

#[allow(clippy::expect_used)]
static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+\-]?\d+(?:[.,]\d*)?").expect("amount regex"));

#[allow(clippy::expect_used)]
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(rub|usd|eur|gbp|jpy)\b").expect("currency regex"));

// ISO codes people type that the backend cannot book.
#[allow(clippy::expect_used)]
static FOREIGN_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(chf|cny|kzt|uah|byn|pln|sek|nok|czk|aud|cad|inr)\b").expect("foreign regex")
});

const RU_DAYS: &[(&str, i64)] = &[("сегодня", 0), ("вчера", 1), ("позавчера", 2)];
const EN_DAYS: &[(&str, i64)] = &[
    ("today", 0),
    ("yesterday", 1),
    ("day before yesterday", 2),
];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("amount: not found")]
    AmountNotFound,
    #[error("amount: zero")]
    AmountZero,
    #[error("amount: too large")]
    AmountTooLarge,
    #[error("currency: invalid")]
    InvalidCurrency,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub kind: TransactionType,
    pub amount_minor: i64,
    /// `None` when the message names no currency.
    pub currency: Option<Currency>,
    pub description: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub errors: Vec<ParseError>,
}

impl ParsedTransaction {
    fn invalid(error: ParseError) -> Self {
        Self {
            kind: TransactionType::Expense,
            amount_minor: 0,
            currency: None,
            description: String::new(),
            occurred_at: None,
            errors: vec![error],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Parser {
    /// Relative day phrases of every enabled locale, longest first.
    relative_days: Vec<(&'static str, i64)>,
    timezone: Tz,
}

fn locale_table(code: &str) -> Option<&'static [(&'static str, i64)]> {
    match code {
        "ru" => Some(RU_DAYS),
        "en" => Some(EN_DAYS),
        _ => None,
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Parser {
    pub fn new<S: AsRef<str>>(locales: &[S], timezone: Tz) -> Self {
        let mut relative_days: Vec<(&'static str, i64)> = Vec::new();
        for code in locales {
            match locale_table(code.as_ref()) {
                Some(table) => relative_days.extend_from_slice(table),
                None => tracing::warn!("Unknown parser locale {}, skipped", code.as_ref()),
            }
        }
        if relative_days.is_empty() {
            relative_days.extend_from_slice(RU_DAYS);
        }
        relative_days.sort_by_key(|(phrase, _)| std::cmp::Reverse(phrase.chars().count()));

        Self {
            relative_days,
            timezone,
        }
    }

    pub fn parse(&self, text: &str) -> ParsedTransaction {
        self.parse_at(text, Utc::now())
    }

    /// Parses `text` as if the current instant were `now`.
    pub fn parse_at(&self, text: &str, now: DateTime<Utc>) -> ParsedTransaction {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return ParsedTransaction::invalid(ParseError::Empty);
        }

        let mut rest = trimmed.to_lowercase();
        let today = now.with_timezone(&self.timezone).date_naive();
        let mut occurred_at = None;

        if let Some((phrase, days_back)) = self
            .relative_days
            .iter()
            .find(|(phrase, _)| rest.contains(phrase))
        {
            occurred_at = self.local_midnight(today - Duration::days(*days_back));
            rest = rest.replace(phrase, " ");
        }

        if let Some((date, range)) = numeric_date(&rest, today) {
            occurred_at = self.local_midnight(date);
            rest.replace_range(range, " ");
        }

        let mut errors = Vec::new();
        let currency = match find_currency(&rest) {
            Some((currency, range)) => {
                rest.replace_range(range, " ");
                Some(currency)
            }
            None => {
                if let Some(m) = FOREIGN_CODE_RE.find(&rest) {
                    errors.push(ParseError::InvalidCurrency);
                    rest.replace_range(m.range(), " ");
                }
                None
            }
        };

        let mut kind = TransactionType::Expense;
        let mut amount_minor = 0;
        match AMOUNT_RE.find(&rest) {
            Some(m) => {
                let token = m.as_str();
                if token.starts_with('+') {
                    kind = TransactionType::Income;
                }
                match to_minor(token.trim_start_matches(['+', '-'])) {
                    Some(0) => errors.push(ParseError::AmountZero),
                    Some(minor) => amount_minor = minor,
                    None => errors.push(ParseError::AmountTooLarge),
                }
                rest.replace_range(m.range(), " ");
            }
            None => errors.push(ParseError::AmountNotFound),
        }
        errors.sort_by_key(|e| matches!(e, ParseError::InvalidCurrency));

        ParsedTransaction {
            kind,
            amount_minor,
            currency,
            description: collapse_whitespace(&rest),
            occurred_at,
            errors,
        }
    }

    fn local_midnight(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        self.timezone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

fn numeric_date(text: &str, today: NaiveDate) -> Option<(NaiveDate, std::ops::Range<usize>)> {
    use chrono::Datelike;

    let caps = DATE_RE.captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year = match caps.get(3) {
        Some(y) => {
            let y: i32 = y.as_str().parse().ok()?;
            if y < 100 { 2000 + y } else { y }
        }
        None => today.year(),
    };
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }
    // Days past the end of the month roll into the next one: 31.02 is 03.03.
    let date = NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_signed(Duration::days(i64::from(day) - 1))?;
    Some((date, caps.get(0)?.range()))
}

/// Earliest currency symbol or supported code in `text`.
fn find_currency(text: &str) -> Option<(Currency, std::ops::Range<usize>)> {
    let symbol = text.char_indices().find_map(|(idx, c)| {
        Currency::from_symbol(c).map(|currency| (currency, idx..idx + c.len_utf8()))
    });
    let code = CODE_RE.find(text).and_then(|m| {
        Currency::try_from(m.as_str())
            .ok()
            .map(|currency| (currency, m.range()))
    });

    match (symbol, code) {
        (Some(s), Some(c)) => Some(if s.1.start <= c.1.start { s } else { c }),
        (s, c) => s.or(c),
    }
}

/// Major-unit decimal to minor units; extra fraction digits are truncated.
fn to_minor(value: &str) -> Option<i64> {
    let (whole, frac) = match value.find(['.', ',']) {
        Some(idx) => (&value[..idx], &value[idx + 1..]),
        None => (value, ""),
    };
    let whole: i64 = whole.parse().ok()?;
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.get(..2)?.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(cents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn parser() -> Parser {
        Parser::new(&["ru"], chrono_tz::Europe::Moscow)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    fn moscow_midnight(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        chrono_tz::Europe::Moscow
            .with_ymd_and_hms(y, m, d, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn expense_with_ruble_symbol() {
        let parsed = parser().parse_at("1000₽ продукты", now());
        assert!(parsed.is_valid());
        assert_eq!(parsed.kind, TransactionType::Expense);
        assert_eq!(parsed.amount_minor, 100_000);
        assert_eq!(parsed.currency, Some(Currency::Rub));
        assert_eq!(parsed.description, "продукты");
    }

    #[test]
    fn income_with_plus_and_date() {
        let parsed = parser().parse_at("+50000 зарплата 01.12", now());
        assert!(parsed.is_valid());
        assert_eq!(parsed.kind, TransactionType::Income);
        assert_eq!(parsed.amount_minor, 5_000_000);
        assert_eq!(parsed.currency, None);
        assert_eq!(parsed.description, "зарплата");
        assert_eq!(parsed.occurred_at, Some(moscow_midnight(2025, 12, 1)));
    }

    #[test]
    fn decimals_are_truncated() {
        let parsed = parser().parse_at("12.345 такси", now());
        assert_eq!(parsed.amount_minor, 1234);
        assert_eq!(parsed.description, "такси");

        assert_eq!(parser().parse_at("7,5 кофе", now()).amount_minor, 750);
        assert_eq!(parser().parse_at("3. чай", now()).amount_minor, 300);
    }

    #[test]
    fn minus_sign_is_expense() {
        let parsed = parser().parse_at("вчера -450 такси", now());
        assert_eq!(parsed.kind, TransactionType::Expense);
        assert_eq!(parsed.amount_minor, 45_000);
        assert_eq!(parsed.description, "такси");
        assert_eq!(parsed.occurred_at, Some(moscow_midnight(2025, 3, 14)));
    }

    #[test]
    fn day_before_yesterday_is_not_yesterday() {
        let parsed = parser().parse_at("позавчера 100 кино", now());
        assert_eq!(parsed.occurred_at, Some(moscow_midnight(2025, 3, 13)));
        assert_eq!(parsed.description, "кино");
    }

    #[test]
    fn today_uses_local_calendar_day() {
        // 22:30 UTC is already the next day in Moscow.
        let late = Utc.with_ymd_and_hms(2025, 3, 15, 22, 30, 0).unwrap();
        let parsed = parser().parse_at("сегодня 100 хлеб", late);
        assert_eq!(parsed.occurred_at, Some(moscow_midnight(2025, 3, 16)));
    }

    #[test]
    fn english_locale_is_additive() {
        let parser = Parser::new(&["ru", "en"], chrono_tz::UTC);
        let parsed = parser.parse_at("Day before yesterday 20 usd lunch", now());
        assert_eq!(
            parsed.occurred_at.map(|d| d.day()),
            Some(13)
        );
        assert_eq!(parsed.currency, Some(Currency::Usd));
        assert_eq!(parsed.description, "lunch");
    }

    #[test]
    fn two_digit_year_and_invalid_dates() {
        let parsed = parser().parse_at("5 книга 03.04.24", now());
        assert_eq!(parsed.occurred_at, Some(moscow_midnight(2024, 4, 3)));
        assert_eq!(parsed.amount_minor, 500);

        let parsed = parser().parse_at("32.01 подарок", now());
        assert_eq!(parsed.occurred_at, None);
    }

    #[test]
    fn overflowing_day_rolls_into_next_month() {
        let parsed = parser().parse_at("31.02 500 подарок", now());
        assert!(parsed.is_valid());
        assert_eq!(parsed.amount_minor, 50_000);
        assert_eq!(parsed.description, "подарок");
        assert_eq!(parsed.occurred_at, Some(moscow_midnight(2025, 3, 3)));

        let parsed = parser().parse_at("31.04.24 100 кино", now());
        assert_eq!(parsed.occurred_at, Some(moscow_midnight(2024, 5, 1)));
        assert_eq!(parsed.amount_minor, 10_000);
    }

    #[test]
    fn currency_codes_are_whole_words() {
        let parsed = parser().parse_at("150 EUR eurovision", now());
        assert_eq!(parsed.currency, Some(Currency::Eur));
        assert_eq!(parsed.description, "eurovision");

        let parsed = parser().parse_at("150 eurovision", now());
        assert_eq!(parsed.currency, None);
    }

    #[test]
    fn unsupported_currency_is_reported() {
        let parsed = parser().parse_at("100 chf сыр", now());
        assert!(!parsed.is_valid());
        assert_eq!(parsed.errors, [ParseError::InvalidCurrency]);
    }

    #[test]
    fn empty_and_missing_amount() {
        assert_eq!(parser().parse_at("   ", now()).errors, [ParseError::Empty]);
        assert_eq!(
            parser().parse_at("просто текст", now()).errors,
            [ParseError::AmountNotFound]
        );
        assert_eq!(
            parser().parse_at("0 ничего", now()).errors,
            [ParseError::AmountZero]
        );
        assert_eq!(
            parser()
                .parse_at("99999999999999999999 много", now())
                .errors,
            [ParseError::AmountTooLarge]
        );
    }

    #[test]
    fn plain_amount_and_word() {
        for n in [1_i64, 42, 999, 123_456] {
            let parsed = parser().parse_at(&format!("{n} description"), now());
            assert!(parsed.is_valid());
            assert_eq!(parsed.amount_minor, n * 100);
            assert_eq!(parsed.description, "description");
            assert_eq!(parsed.kind, TransactionType::Expense);
        }
    }

    #[test]
    fn result_is_valid_or_has_errors() {
        let inputs = [
            "",
            "+",
            "-",
            "₽",
            "1.1.1",
            "вчера",
            "12.12.2024 ₽ $",
            "+0.00 тест",
            "abc 1,2,3",
            "¥¥¥ 5",
        ];
        for input in inputs {
            let parsed = parser().parse_at(input, now());
            assert!(
                (parsed.is_valid() && parsed.amount_minor > 0) || !parsed.errors.is_empty(),
                "{input:?} -> {parsed:?}"
            );
        }
    }
}
