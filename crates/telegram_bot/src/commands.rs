//! Command, callback and report-argument grammar.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Telegram rejects callback payloads longer than this.
pub(crate) const CALLBACK_DATA_LIMIT: usize = 64;

pub(crate) const TOP_DEFAULT_LIMIT: u32 = 10;
pub(crate) const RECENT_DEFAULT_LIMIT: u32 = 10;
pub(crate) const EXPORT_DEFAULT_LIMIT: u32 = 200;
const MAX_LIMIT: i64 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Start,
    Help(String),
    Cancel,
    Login,
    Register,
    Logout,
    SwitchTenant,
    Categories,
    CreateCategory(String),
    RenameCategory(String),
    DeleteCategory(String),
    Map(String),
    Unmap(String),
    Stats(String),
    TopCategories(String),
    Recent(String),
    Export(String),
    Language,
    Currency,
    Profile,
    Unknown(String),
}

/// Parses a message starting with `/`. Arguments are kept verbatim.
pub(crate) fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix('/')?;
    let (head, arg) = match body.split_once(char::is_whitespace) {
        Some((head, arg)) => (head, arg.trim().to_string()),
        None => (body, String::new()),
    };
    // "/stats@my_bot" in group chats
    let name = head.split('@').next().unwrap_or(head);

    let cmd = match name {
        "start" => Command::Start,
        "help" => Command::Help(arg),
        "cancel" => Command::Cancel,
        "login" => Command::Login,
        "register" => Command::Register,
        "logout" => Command::Logout,
        "switch_tenant" => Command::SwitchTenant,
        "categories" => Command::Categories,
        "create_category" => Command::CreateCategory(arg),
        "rename_category" => Command::RenameCategory(arg),
        "delete_category" => Command::DeleteCategory(arg),
        "map" => Command::Map(arg),
        "unmap" => Command::Unmap(arg),
        "stats" => Command::Stats(arg),
        "top_categories" => Command::TopCategories(arg),
        "recent" => Command::Recent(arg),
        "export" => Command::Export(arg),
        "language" => Command::Language,
        "currency" => Command::Currency,
        "profile" => Command::Profile,
        other => Command::Unknown(other.to_string()),
    };
    Some(cmd)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CategoryRef {
    Id(String),
    /// Position in the category list stored with an operation context.
    Indexed { op_id: String, index: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Callback {
    Category(CategoryRef),
    Confirm(bool),
    Lang(String),
    Cur(String),
    Tenant(String),
    /// Empty section means the main help page.
    Help(String),
    Unknown,
}

pub(crate) fn parse_callback(data: &str) -> Callback {
    let Some((kind, value)) = data.split_once(':') else {
        return Callback::Unknown;
    };
    match kind {
        "cat" => match value.strip_prefix('@') {
            Some(op) => match op.rsplit_once(':') {
                Some((op_id, index)) => match index.parse() {
                    Ok(index) => Callback::Category(CategoryRef::Indexed {
                        op_id: op_id.to_string(),
                        index,
                    }),
                    Err(_) => Callback::Unknown,
                },
                None => Callback::Unknown,
            },
            None if value.is_empty() => Callback::Unknown,
            None => Callback::Category(CategoryRef::Id(value.to_string())),
        },
        "confirm" => match value {
            "yes" => Callback::Confirm(true),
            "no" => Callback::Confirm(false),
            _ => Callback::Unknown,
        },
        "lang" => Callback::Lang(value.to_string()),
        "cur" => Callback::Cur(value.to_string()),
        "tenant" => Callback::Tenant(value.to_string()),
        "help" => Callback::Help(value.to_string()),
        _ => Callback::Unknown,
    }
}

/// `cat:<id>` when it fits, otherwise a reference into the operation's list.
pub(crate) fn category_callback(category_id: &str, op_id: &str, index: usize) -> String {
    let direct = format!("cat:{category_id}");
    if direct.len() <= CALLBACK_DATA_LIMIT {
        direct
    } else {
        format!("cat:@{op_id}:{index}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Period {
    Month { year: i32, month: u32 },
    /// ISO week starting on `monday`.
    Week { monday: NaiveDate },
}

impl Period {
    pub(crate) fn current_month(today: NaiveDate) -> Self {
        Period::Month {
            year: today.year(),
            month: today.month(),
        }
    }

    pub(crate) fn label(&self) -> String {
        match self {
            Period::Month { year, month } => format!("{year}-{month:02}"),
            Period::Week { monday } => {
                let sunday = *monday + Days::new(6);
                format!("{} — {}", monday.format("%d.%m"), sunday.format("%d.%m.%Y"))
            }
        }
    }

    /// Month used for the monthly summary report.
    pub(crate) fn summary_month(&self) -> (i32, u32) {
        match self {
            Period::Month { year, month } => (*year, *month),
            Period::Week { monday } => (monday.year(), monday.month()),
        }
    }

    /// Local first day and the day after the last one.
    fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Period::Month { year, month } => {
                let start = NaiveDate::from_ymd_opt(*year, *month, 1)?;
                Some((start, start.checked_add_months(Months::new(1))?))
            }
            Period::Week { monday } => Some((*monday, *monday + Days::new(7))),
        }
    }

    /// Half-open UTC range `[from, to)` in the given timezone.
    pub(crate) fn utc_range(&self, tz: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (start, end) = self.bounds()?;
        let local = |d: NaiveDate| {
            tz.from_local_datetime(&d.and_hms_opt(0, 0, 0)?)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        };
        Some((local(start)?, local(end)?))
    }
}

pub(crate) fn parse_period(token: &str, today: NaiveDate) -> Option<Period> {
    if token.eq_ignore_ascii_case("week") || token == "неделя" {
        let monday = today - Days::new(u64::from(today.weekday().num_days_from_monday()));
        return Some(Period::Week { monday });
    }
    let (year, month) = token.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12)
        .contains(&month)
        .then_some(Period::Month { year, month })
}

/// User limits are clamped into `[1, 100]`; zero, negative or non-numeric
/// values fall back to `default`.
pub(crate) fn clamp_limit(raw: Option<&str>, default: u32) -> u32 {
    match raw.and_then(|r| r.parse::<i64>().ok()) {
        Some(n) if n > 0 => n.min(MAX_LIMIT) as u32,
        _ => default,
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid period: {0}")]
pub(crate) struct InvalidPeriod(pub String);

/// Splits `[period] [limit]`. A leading number is taken as the limit.
pub(crate) fn parse_report_args(
    args: &str,
    today: NaiveDate,
    default_limit: u32,
) -> Result<(Period, u32), InvalidPeriod> {
    let mut tokens = args.split_whitespace().peekable();
    let period = match tokens.peek() {
        Some(first) if first.parse::<i64>().is_err() => {
            let period = parse_period(first, today).ok_or_else(|| InvalidPeriod(first.to_string()))?;
            tokens.next();
            period
        }
        _ => Period::current_month(today),
    };
    let limit = clamp_limit(tokens.next(), default_limit);
    Ok((period, limit))
}
