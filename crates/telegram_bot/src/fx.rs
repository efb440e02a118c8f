//! Currency conversion backed by the remote FX service.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use api_types::{Currency, fx::RateRequest};
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::{api::FinanceApi, error::BotError};

pub(crate) const RATE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Copy, Debug)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

/// In-process cache in front of `GetRate`, keyed by `FROM|TO|YYYY-MM-DD`.
pub(crate) struct FxConverter {
    api: Arc<dyn FinanceApi>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedRate>>,
}

fn cache_key(from: Currency, to: Currency, as_of: NaiveDate) -> String {
    format!("{}|{}|{}", from.code(), to.code(), as_of.format("%Y-%m-%d"))
}

impl FxConverter {
    pub(crate) fn new(api: Arc<dyn FinanceApi>, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn rate(
        &self,
        token: &str,
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    ) -> Result<f64, BotError> {
        if from == to {
            return Ok(1.0);
        }

        let key = cache_key(from, to, as_of);
        {
            let mut cache = self.cache.lock().await;
            let hit = cache
                .get(&key)
                .map(|cached| (cached.rate, cached.fetched_at.elapsed() < self.ttl));
            match hit {
                Some((rate, true)) => return Ok(rate),
                Some((_, false)) => {
                    cache.remove(&key);
                }
                None => {}
            }
        }

        let rate = self
            .api
            .fx_rate(
                token,
                &RateRequest {
                    from: from.code().to_string(),
                    to: to.code().to_string(),
                    as_of,
                },
            )
            .await?;
        tracing::debug!("Fetched rate {key} = {rate}");

        let mut cache = self.cache.lock().await;
        cache.retain(|_, cached| cached.fetched_at.elapsed() < self.ttl);
        cache.insert(
            key,
            CachedRate {
                rate,
                fetched_at: Instant::now(),
            },
        );
        Ok(rate)
    }

    pub(crate) async fn convert(
        &self,
        token: &str,
        amount_minor: i64,
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    ) -> Result<i64, BotError> {
        let rate = self.rate(token, from, to, as_of).await?;
        Ok((amount_minor as f64 * rate).round() as i64)
    }
}
