// src/lib.rs

use std::sync::Arc;

use jobs::scheduler::Scheduler;
use repository::CatalogRepository;
use services::{demand_tracker::DemandTracker, rate_fetcher::RateFetcher, rate_store::RateStore};

#[derive(Clone)]
pub struct AppState {
    pub rate_store: RateStore,
    pub fetcher: RateFetcher,
    pub catalog: Arc<dyn CatalogRepository>,
    pub demand: Arc<DemandTracker>,
    pub scheduler: Arc<Scheduler>,
}

pub mod config;
pub mod error;
pub mod repository;

pub mod entities {
    pub mod prelude;
    pub mod products;
    pub mod product_variants;
    pub mod currencies;
    pub mod exchange_rates;
    pub mod sync_status;
}

pub mod services {
    pub mod signal_scorer;
    pub mod price_calculator;
    pub mod attributes;
    pub mod variant_aggregator;
    pub mod currency_converter;
    pub mod rate_fetcher;
    pub mod rate_store;
    pub mod demand_tracker;
    pub mod price_normalization;
}

pub mod jobs;
pub mod models;
pub mod handlers;
