//! Rate Store
//!
//! Persists fetched snapshots and answers "what is the rate for X right now".
//! Request paths only ever read the last persisted snapshot; they never wait
//! on the provider.

use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PricingError, PricingResult};
use crate::repository::RateRepository;
use crate::services::currency_converter::{self, BASE_CURRENCY, ConvertedPrice, CurrencyConfig};
use crate::services::rate_fetcher::{FetchOutcome, FetchStatus, RateFetcher};

/// Provider label for the base currency's implicit 1.0 rate
pub const SYSTEM_PROVIDER: &str = "system";

/// Provider label for administrator-supplied rates
pub const MANUAL_PROVIDER: &str = "manual";

/// One dated record of all rates relative to the base currency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSnapshot {
    pub base: String,
    pub date: NaiveDate,
    pub rates: BTreeMap<String, Decimal>,
    pub provider: String,
    pub fetch_status: FetchStatus,
    pub fetch_errors: Vec<String>,
    pub missing_currencies: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    /// Build a snapshot from a non-failed fetch.
    pub fn from_outcome(outcome: &FetchOutcome, fetched_at: DateTime<Utc>) -> Self {
        Self {
            base: BASE_CURRENCY.to_string(),
            date: outcome.date.unwrap_or_else(|| fetched_at.date_naive()),
            rates: outcome.rates.clone(),
            provider: outcome.provider.clone(),
            fetch_status: outcome.status,
            fetch_errors: outcome.errors.clone(),
            missing_currencies: outcome.missing_currencies.clone(),
            fetched_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRate {
    pub currency: String,
    pub rate: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub provider: Option<String>,
    pub rate_unavailable: bool,
}

impl ResolvedRate {
    fn unavailable(currency: String) -> Self {
        tracing::debug!("{}", PricingError::RateUnavailable(currency.clone()));
        Self {
            currency,
            rate: None,
            date: None,
            provider: None,
            rate_unavailable: true,
        }
    }
}

/// FX values frozen onto an order at checkout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderFxSnapshot {
    pub currency: String,
    pub rate: Decimal,
    pub amount: Decimal,
    pub amount_base: Decimal,
    pub date: Option<NaiveDate>,
    pub provider: String,
    pub rate_unavailable: bool,
}

/// Outcome of an admin-triggered (or scheduled) refresh
#[derive(Debug, Serialize)]
pub struct RefreshReport {
    pub success: bool,
    pub status: FetchStatus,
    pub date: Option<NaiveDate>,
    pub rates_count: usize,
    pub rates: BTreeMap<String, Decimal>,
    pub missing_currencies: Vec<String>,
    pub unsupported_currencies: Vec<String>,
    pub errors: Vec<String>,
    /// Provider calls made; 0 when the refresh failed before fetching
    pub attempts: u32,
    /// Typed cause when `success` is false: `ProviderUnavailable` once the
    /// retries are exhausted, otherwise the storage error.
    #[serde(skip)]
    pub error: Option<PricingError>,
}

#[derive(Clone)]
pub struct RateStore {
    repo: Arc<dyn RateRepository>,
    currencies: Cache<String, CurrencyConfig>,
}

impl RateStore {
    pub fn new(repo: Arc<dyn RateRepository>) -> Self {
        let currencies = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(60))
            .build();

        Self { repo, currencies }
    }

    /// Idempotent write keyed by `(base, date)`.
    pub async fn upsert(&self, snapshot: &RateSnapshot) -> PricingResult<()> {
        self.repo.upsert_snapshot(snapshot).await?;
        tracing::info!(
            "Stored {} rates for {} from {} ({})",
            snapshot.rates.len(),
            snapshot.date,
            snapshot.provider,
            snapshot.fetch_status.as_str()
        );
        Ok(())
    }

    pub async fn latest(&self) -> PricingResult<Option<RateSnapshot>> {
        self.repo.latest_snapshot(BASE_CURRENCY).await
    }

    pub async fn snapshot_for(&self, date: NaiveDate) -> PricingResult<Option<RateSnapshot>> {
        self.repo.snapshot_for_date(BASE_CURRENCY, date).await
    }

    pub async fn active_currencies(&self) -> PricingResult<Vec<CurrencyConfig>> {
        self.repo.active_currencies().await
    }

    pub async fn currency_config(&self, code: &str) -> PricingResult<Option<CurrencyConfig>> {
        let code = code.trim().to_uppercase();

        if let Some(cached) = self.currencies.get(&code).await {
            return Ok(Some(cached));
        }

        let config = self.repo.find_currency(&code).await?;
        if let Some(ref config) = config {
            self.currencies.insert(code, config.clone()).await;
        }
        Ok(config)
    }

    /// Currency config, or the synthesized default when none is configured.
    pub async fn currency_config_or_default(&self, code: &str) -> CurrencyConfig {
        let code = code.trim().to_uppercase();
        if code == BASE_CURRENCY {
            if let Ok(Some(config)) = self.currency_config(&code).await {
                return config;
            }
            return CurrencyConfig::base();
        }

        let error = match self.currency_config(&code).await {
            Ok(Some(config)) => return config,
            Ok(None) => PricingError::Configuration(format!("no currency config for {}", code)),
            Err(e) => e,
        };

        tracing::warn!("{}; using default display settings", error);
        CurrencyConfig::fallback(&code)
    }

    pub fn invalidate_currency_cache(&self) {
        self.currencies.invalidate_all();
    }

    /// Resolve the current rate: base currency, then manual rate, then the
    /// latest snapshot. Storage errors degrade to "unavailable".
    pub async fn resolve(&self, code: &str) -> ResolvedRate {
        let config = self.currency_config_or_default(code).await;
        self.resolve_with_config(&config).await
    }

    async fn resolve_with_config(&self, config: &CurrencyConfig) -> ResolvedRate {
        let code = config.code.clone();

        if config.is_base() {
            return ResolvedRate {
                currency: code,
                rate: Some(Decimal::ONE),
                date: None,
                provider: Some(SYSTEM_PROVIDER.to_string()),
                rate_unavailable: false,
            };
        }

        if let Some(manual) = config.usable_manual_rate() {
            return ResolvedRate {
                currency: code,
                rate: Some(manual),
                date: None,
                provider: Some(MANUAL_PROVIDER.to_string()),
                rate_unavailable: false,
            };
        }

        let snapshot = match self.latest().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Failed to load latest rates while resolving {}: {}", code, e);
                None
            }
        };

        match snapshot {
            Some(snapshot) => match snapshot.rates.get(&code) {
                Some(rate) if *rate > Decimal::ZERO => ResolvedRate {
                    currency: code,
                    rate: Some(*rate),
                    date: Some(snapshot.date),
                    provider: Some(snapshot.provider.clone()),
                    rate_unavailable: false,
                },
                _ => ResolvedRate::unavailable(code),
            },
            None => ResolvedRate::unavailable(code),
        }
    }

    /// Display price of `amount_base` in `code`.
    pub async fn quote(&self, amount_base: Decimal, code: &str) -> ConvertedPrice {
        let config = self.currency_config_or_default(code).await;
        let resolved = self.resolve_with_config(&config).await;

        if resolved.rate_unavailable {
            tracing::debug!("Rate unavailable for {}, showing base amount", config.code);
        }

        currency_converter::convert(amount_base, resolved.rate, &config)
    }

    /// Freeze the FX values for an order. Without a rate (or when the
    /// converted amount overflows) the order stays in the base currency with rate 1.
    pub async fn snapshot_for_order(&self, amount_base: Decimal, code: &str) -> OrderFxSnapshot {
        let resolved = self.resolve(code).await;
        let converted = resolved
            .rate
            .and_then(|rate| amount_base.checked_mul(rate).map(|amount| (rate, amount)));

        if resolved.rate.is_some() && converted.is_none() {
            tracing::warn!(
                currency = %resolved.currency,
                amount = %amount_base,
                "Order amount overflows, keeping base currency"
            );
        }

        match converted {
            Some((rate, amount)) => OrderFxSnapshot {
                amount,
                currency: resolved.currency,
                rate,
                amount_base,
                date: resolved.date,
                provider: resolved.provider.unwrap_or_default(),
                rate_unavailable: false,
            },
            None => OrderFxSnapshot {
                currency: BASE_CURRENCY.to_string(),
                rate: Decimal::ONE,
                amount: amount_base,
                amount_base,
                date: None,
                provider: SYSTEM_PROVIDER.to_string(),
                rate_unavailable: true,
            },
        }
    }

    /// Fetch rates for every active non-base currency and persist them.
    ///
    /// Never returns an error: failures are reported in the `RefreshReport`.
    pub async fn refresh(&self, fetcher: &RateFetcher) -> RefreshReport {
        let currencies = match self.active_currencies().await {
            Ok(currencies) => currencies,
            Err(e) => {
                tracing::error!("Failed to load active currencies: {}", e);
                let message = e.to_string();
                return RefreshReport {
                    success: false,
                    status: FetchStatus::Failed,
                    date: None,
                    rates_count: 0,
                    rates: BTreeMap::new(),
                    missing_currencies: Vec::new(),
                    unsupported_currencies: Vec::new(),
                    errors: vec![message],
                    attempts: 0,
                    error: Some(e),
                };
            }
        };

        let codes: Vec<String> = currencies
            .iter()
            .filter(|c| !c.is_base())
            .map(|c| c.code.clone())
            .collect();

        tracing::info!("Refreshing exchange rates for {} currencies", codes.len());

        let outcome = fetcher.fetch(&codes).await;
        let mut errors = outcome.errors.clone();
        let mut error = outcome.to_error();

        if error.is_none() && !outcome.rates.is_empty() {
            let snapshot = RateSnapshot::from_outcome(&outcome, Utc::now());
            if let Err(e) = self.upsert(&snapshot).await {
                tracing::error!("Failed to store rate snapshot: {}", e);
                errors.push(e.to_string());
                error = Some(e);
            }
        }

        RefreshReport {
            success: error.is_none(),
            status: outcome.status,
            date: outcome.date,
            rates_count: outcome.rates.len(),
            rates: outcome.rates,
            missing_currencies: outcome.missing_currencies,
            unsupported_currencies: outcome.unsupported,
            errors,
            attempts: outcome.attempts,
            error,
        }
    }
}
