//! Exchange rate acquisition from an external provider.
//!
//! The fetcher never writes anything; the rate store persists what it returns.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PricingError, PricingResult};
use crate::services::currency_converter::BASE_CURRENCY;

/// Total attempts per fetch (first call + retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry, doubled on each subsequent one
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Currencies published by the default (Frankfurter / ECB) provider
pub const FRANKFURTER_CURRENCIES: &[&str] = &[
    "AUD", "BGN", "BRL", "CAD", "CHF", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "HUF", "IDR",
    "ILS", "INR", "ISK", "JPY", "KRW", "MXN", "MYR", "NOK", "NZD", "PHP", "PLN", "RON", "SEK",
    "SGD", "THB", "TRY", "USD", "ZAR",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Partial,
    Failed,
}

impl FetchStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" => Some(FetchStatus::Success),
            "partial" => Some(FetchStatus::Partial),
            "failed" => Some(FetchStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::Partial => "partial",
            FetchStatus::Failed => "failed",
        }
    }
}

/// Raw provider answer: `{date, base, rates: {CODE: number}}`
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRates {
    pub date: NaiveDate,
    pub base: String,
    pub rates: HashMap<String, Decimal>,
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, code: &str) -> bool;

    /// One network round-trip. `codes` are already filtered to supported ones.
    async fn fetch_rates(&self, base: &str, codes: &[String]) -> PricingResult<ProviderRates>;
}

/// HTTP provider speaking the Frankfurter `/latest` API
#[derive(Clone)]
pub struct HttpRateProvider {
    client: Client,
    base_url: String,
    name: String,
    supported: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    base: String,
    date: NaiveDate,
    rates: HashMap<String, f64>,
}

impl HttpRateProvider {
    pub fn new(base_url: String, name: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            name,
            supported: FRANKFURTER_CURRENCIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, code: &str) -> bool {
        self.supported.iter().any(|c| c.eq_ignore_ascii_case(code))
    }

    async fn fetch_rates(&self, base: &str, codes: &[String]) -> PricingResult<ProviderRates> {
        let url = format!("{}/latest", self.base_url);
        let symbols = codes.join(",");

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(&[("from", base), ("to", symbols.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Rate provider error {}: {}", status, error_text).into());
        }

        let data: LatestRatesResponse = response.json().await?;

        let rates = data
            .rates
            .into_iter()
            .filter_map(|(code, rate)| Decimal::from_f64(rate).map(|r| (code.to_uppercase(), r)))
            .collect();

        Ok(ProviderRates {
            date: data.date,
            base: data.base.to_uppercase(),
            rates,
        })
    }
}

/// Result of one fetch, including partial and failed outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub status: FetchStatus,
    pub provider: String,
    pub date: Option<NaiveDate>,
    pub rates: BTreeMap<String, Decimal>,
    pub requested: Vec<String>,
    /// Requested codes the provider does not publish (skipped)
    pub unsupported: Vec<String>,
    /// Supported codes the provider did not return
    pub missing_currencies: Vec<String>,
    pub errors: Vec<String>,
    pub attempts: u32,
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        self.status == FetchStatus::Failed
    }

    pub fn to_error(&self) -> Option<PricingError> {
        if !self.is_failed() {
            return None;
        }
        Some(PricingError::ProviderUnavailable {
            attempts: self.attempts,
            last_error: self.errors.last().cloned().unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct RateFetcher {
    provider: Arc<dyn RateProvider>,
    max_attempts: u32,
    base_delay: Duration,
}

impl RateFetcher {
    pub fn new(provider: Arc<dyn RateProvider>) -> Self {
        Self {
            provider,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Fetch today's rates for `codes` against the base currency.
    pub async fn fetch(&self, codes: &[String]) -> FetchOutcome {
        let mut requested: Vec<String> = Vec::new();
        for code in codes {
            let code = code.trim().to_uppercase();
            if code.is_empty() || code == BASE_CURRENCY || requested.contains(&code) {
                continue;
            }
            requested.push(code);
        }

        let (supported, unsupported): (Vec<String>, Vec<String>) = requested
            .iter()
            .cloned()
            .partition(|code| self.provider.supports(code));

        if !unsupported.is_empty() {
            tracing::debug!(
                "Skipping {} currencies unsupported by {}: {:?}",
                unsupported.len(),
                self.provider.name(),
                unsupported
            );
        }

        let mut outcome = FetchOutcome {
            status: FetchStatus::Success,
            provider: self.provider.name().to_string(),
            date: None,
            rates: BTreeMap::new(),
            requested,
            unsupported,
            missing_currencies: Vec::new(),
            errors: Vec::new(),
            attempts: 0,
        };

        if supported.is_empty() {
            tracing::info!("No provider-supported currencies requested, skipping fetch");
            return outcome;
        }

        let mut delay = self.base_delay;
        let mut response = None;

        for attempt in 1..=self.max_attempts {
            outcome.attempts = attempt;

            match self.provider.fetch_rates(BASE_CURRENCY, &supported).await {
                Ok(rates) => {
                    response = Some(rates);
                    break;
                }
                Err(e) => {
                    outcome.errors.push(format!("attempt {}: {}", attempt, e));

                    if attempt == self.max_attempts {
                        tracing::error!(
                            "Rate fetch from {} failed after {} attempts: {}",
                            self.provider.name(),
                            attempt,
                            e
                        );
                        break;
                    }

                    tracing::warn!(
                        "Rate fetch attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );

                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                }
            }
        }

        let Some(response) = response else {
            outcome.status = FetchStatus::Failed;
            outcome.missing_currencies = supported;
            return outcome;
        };

        if !response.base.eq_ignore_ascii_case(BASE_CURRENCY) {
            outcome.status = FetchStatus::Failed;
            outcome.errors.push(format!(
                "provider answered with base {} instead of {}",
                response.base, BASE_CURRENCY
            ));
            outcome.missing_currencies = supported;
            return outcome;
        }

        outcome.date = Some(response.date);
        for code in &supported {
            match response.rates.get(code) {
                Some(rate) if *rate > Decimal::ZERO => {
                    outcome.rates.insert(code.clone(), *rate);
                }
                _ => outcome.missing_currencies.push(code.clone()),
            }
        }

        outcome.status = if outcome.rates.is_empty() {
            outcome.errors.push("provider returned no usable rates".to_string());
            FetchStatus::Failed
        } else if outcome.missing_currencies.is_empty() {
            FetchStatus::Success
        } else {
            tracing::warn!(
                "Partial rate fetch: missing {:?}",
                outcome.missing_currencies
            );
            FetchStatus::Partial
        };

        outcome
    }
}
