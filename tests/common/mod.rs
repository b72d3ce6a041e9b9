use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use marketplace_pricing::{
    error::{PricingError, PricingResult},
    jobs::{
        exchange_rate_refresh::ExchangeRateRefreshJob, price_recalculation::PriceRecalculationJob,
        scheduler::Scheduler,
    },
    repository::{
        memory::{MemoryCatalogRepository, MemoryJobStatusRepository, MemoryRateRepository},
        PricingFields, ProductRecord,
    },
    services::{
        currency_converter::{CurrencyConfig, PriceRounding, SymbolPosition},
        demand_tracker::DemandTracker,
        rate_fetcher::{ProviderRates, RateFetcher, RateProvider},
        rate_store::RateStore,
    },
    AppState,
};

/// Provider answering from a fixed table, optionally failing every call.
pub struct StaticRateProvider {
    pub rates: HashMap<String, Decimal>,
    pub down: bool,
    pub calls: AtomicU32,
}

impl StaticRateProvider {
    pub fn new(rates: &[(&str, Decimal)]) -> Self {
        Self {
            rates: rates.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
            down: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn down() -> Self {
        Self {
            down: true,
            ..Self::new(&[])
        }
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn supports(&self, code: &str) -> bool {
        code != "NGN"
    }

    async fn fetch_rates(&self, base: &str, _codes: &[String]) -> PricingResult<ProviderRates> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down {
            return Err(PricingError::Other("connection refused".to_string()));
        }

        Ok(ProviderRates {
            date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            base: base.to_string(),
            rates: self.rates.clone(),
        })
    }
}

pub fn euro() -> CurrencyConfig {
    CurrencyConfig {
        symbol: "€".to_string(),
        symbol_position: SymbolPosition::After,
        ..CurrencyConfig::fallback("EUR")
    }
}

pub fn pound() -> CurrencyConfig {
    CurrencyConfig {
        symbol: "£".to_string(),
        rounding: PriceRounding::Ending9,
        ..CurrencyConfig::fallback("GBP")
    }
}

pub fn simple_product(id: i32, base: Decimal, stock: i32) -> ProductRecord {
    let mut pricing = PricingFields::new(base);
    pricing.platform_markup_pct = Some(dec!(10));
    ProductRecord {
        id,
        name: format!("Product {}", id),
        pricing,
        stock,
        is_active: true,
        has_variants: false,
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    pub catalog: Arc<MemoryCatalogRepository>,
    pub rates: Arc<MemoryRateRepository>,
    pub job_status: Arc<MemoryJobStatusRepository>,
}

/// In-memory app with USD, EUR and GBP configured.
pub fn test_app(provider: StaticRateProvider) -> TestApp {
    let catalog = Arc::new(MemoryCatalogRepository::new());
    let rates = Arc::new(MemoryRateRepository::new());
    let job_status = Arc::new(MemoryJobStatusRepository::new());

    rates.add_currency(CurrencyConfig::base());
    rates.add_currency(euro());
    rates.add_currency(pound());

    let rate_store = RateStore::new(rates.clone());
    let fetcher = RateFetcher::new(Arc::new(provider)).with_retry(2, Duration::from_millis(5));
    let demand = Arc::new(DemandTracker::new());

    let scheduler = Arc::new(
        Scheduler::new(job_status.clone())
            .register(Arc::new(PriceRecalculationJob::new(
                catalog.clone(),
                demand.clone(),
                50,
                Duration::from_secs(3600),
            )))
            .register(Arc::new(ExchangeRateRefreshJob::new(
                rate_store.clone(),
                fetcher.clone(),
                Duration::from_secs(86400),
            ))),
    );

    TestApp {
        state: AppState {
            rate_store,
            fetcher,
            catalog: catalog.clone(),
            demand,
            scheduler,
        },
        catalog,
        rates,
        job_status,
    }
}
