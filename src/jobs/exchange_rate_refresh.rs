use async_trait::async_trait;
use std::time::Duration;

use crate::error::PricingResult;
use crate::jobs::scheduler::{JobOutcome, ScheduledJob};
use crate::services::rate_fetcher::RateFetcher;
use crate::services::rate_store::RateStore;

pub const JOB_NAME: &str = "exchange_rate_refresh";

pub struct ExchangeRateRefreshJob {
    store: RateStore,
    fetcher: RateFetcher,
    interval: Duration,
}

impl ExchangeRateRefreshJob {
    pub fn new(store: RateStore, fetcher: RateFetcher, interval: Duration) -> Self {
        Self {
            store,
            fetcher,
            interval,
        }
    }
}

#[async_trait]
impl ScheduledJob for ExchangeRateRefreshJob {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> PricingResult<JobOutcome> {
        let report = self.store.refresh(&self.fetcher).await;

        if let Some(error) = report.error {
            return Err(error);
        }

        if !report.missing_currencies.is_empty() {
            tracing::warn!("Provider returned no rate for: {}", report.missing_currencies.join(", "));
        }

        Ok(JobOutcome::new()
            .with("rates", report.rates_count as u64)
            .with("missing", report.missing_currencies.len() as u64)
            .with("unsupported", report.unsupported_currencies.len() as u64))
    }
}
