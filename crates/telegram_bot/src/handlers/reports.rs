use api_types::{
    Currency,
    report::{MonthlySummary, MonthlySummaryRequest},
    transaction::{ExportList, RecentList},
};

use super::Dispatcher;
use crate::{
    commands::{
        EXPORT_DEFAULT_LIMIT, InvalidPeriod, Period, RECENT_DEFAULT_LIMIT, TOP_DEFAULT_LIMIT,
        clamp_limit, parse_report_args,
    },
    error::BotError,
    ui::{self, RecentLine},
};

const EXPORT_FILE_NAME: &str = "export.csv";

impl From<InvalidPeriod> for BotError {
    fn from(err: InvalidPeriod) -> Self {
        BotError::InvalidArgument(format!(
            "Неверный период «{}». Используйте YYYY-MM или week.",
            err.0
        ))
    }
}

impl Dispatcher {
    async fn summary(
        &self,
        token: &str,
        tenant_id: &str,
        period: &Period,
    ) -> Result<MonthlySummary, BotError> {
        let (year, month) = period.summary_month();
        Ok(self
            .finance
            .monthly_summary(
                token,
                &MonthlySummaryRequest {
                    tenant_id: tenant_id.to_string(),
                    year,
                    month,
                    timezone_offset_minutes: self.timezone_offset_minutes(),
                },
            )
            .await?)
    }

    pub(super) async fn stats(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let session = self.session(telegram_id).await?;
        let (period, _) = parse_report_args(args, self.today(), TOP_DEFAULT_LIMIT)?;
        let summary = self
            .summary(&session.access_token, &session.tenant_id, &period)
            .await?;
        self.send(chat_id, &ui::render_stats(&period.label(), &summary))
            .await;
        Ok(())
    }

    pub(super) async fn top_categories(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let session = self.session(telegram_id).await?;
        let (period, limit) = parse_report_args(args, self.today(), TOP_DEFAULT_LIMIT)?;
        let summary = self
            .summary(&session.access_token, &session.tenant_id, &period)
            .await?;
        let items = ui::top_expenses(&summary, limit as usize);
        let text = if items.is_empty() {
            format!("Нет расходов за {}.", period.label())
        } else {
            ui::render_top(&period.label(), &items, &summary.currency)
        };
        self.send(chat_id, &text).await;
        Ok(())
    }

    pub(super) async fn recent(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let session = self.session(telegram_id).await?;
        let limit = clamp_limit(args.split_whitespace().next(), RECENT_DEFAULT_LIMIT);
        let transactions = self
            .finance
            .list_recent(
                &session.access_token,
                &RecentList {
                    tenant_id: session.tenant_id.clone(),
                    limit,
                },
            )
            .await?;
        if transactions.is_empty() {
            self.send(chat_id, "Транзакций пока нет.").await;
            return Ok(());
        }

        let target = self
            .store
            .preferences(telegram_id)
            .await?
            .and_then(|p| p.default_currency)
            .unwrap_or_default();
        let mut lines = Vec::with_capacity(transactions.len());
        for tx in &transactions {
            let converted = match Currency::try_from(tx.currency.as_str()) {
                Ok(from) if from != target => {
                    let as_of = tx.occurred_at.with_timezone(&self.timezone).date_naive();
                    match self
                        .fx
                        .convert(&session.access_token, tx.amount_minor, from, target, as_of)
                        .await
                    {
                        Ok(minor) => Some((minor, target)),
                        Err(err) => {
                            tracing::warn!(telegram_id, "Conversion {from}->{target} failed: {err}");
                            None
                        }
                    }
                }
                _ => None,
            };
            lines.push(RecentLine { tx, converted });
        }
        self.send(chat_id, ui::render_recent(&lines).trim_end()).await;
        Ok(())
    }

    pub(super) async fn export(
        &self,
        telegram_id: i64,
        chat_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        let session = self.session(telegram_id).await?;
        let (period, limit) = parse_report_args(args, self.today(), EXPORT_DEFAULT_LIMIT)?;
        let Some((from, to)) = period.utc_range(self.timezone) else {
            return Err(InvalidPeriod(period.label()).into());
        };
        let transactions = self
            .finance
            .list_for_export(
                &session.access_token,
                &ExportList {
                    tenant_id: session.tenant_id.clone(),
                    from,
                    to,
                    limit,
                },
            )
            .await?;
        if transactions.is_empty() {
            self.send(chat_id, &format!("Нет транзакций за {}.", period.label()))
                .await;
            return Ok(());
        }

        let data = ui::render_export_csv(&transactions, self.timezone)?;
        if let Err(err) = self
            .transport
            .send_document(chat_id, EXPORT_FILE_NAME, data)
            .await
        {
            tracing::error!(telegram_id, "Failed to send export: {err}");
        }
        Ok(())
    }
}
