//! Storage seams between pricing logic and persistence.
//!
//! `postgres` backs these traits with SeaORM, `memory` with in-process maps
//! (tests and database-less local runs).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::PricingResult;
use crate::services::attributes::VariantAttributes;
use crate::services::currency_converter::CurrencyConfig;
use crate::services::price_calculator::PriceInputs;
use crate::services::rate_store::RateSnapshot;

/// Pricing columns shared by products and variants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingFields {
    /// Merchant price
    pub base_price: Decimal,
    /// Merchant list price shown as "was" price
    pub list_price: Option<Decimal>,
    pub discount_price: Option<Decimal>,
    pub platform_markup_pct: Option<Decimal>,
    pub dynamic_markup_pct: Decimal,
    pub manual_override_price: Option<Decimal>,
    pub final_price: Decimal,
}

impl PricingFields {
    pub fn new(base_price: Decimal) -> Self {
        Self {
            base_price,
            list_price: None,
            discount_price: None,
            platform_markup_pct: None,
            dynamic_markup_pct: Decimal::ZERO,
            manual_override_price: None,
            final_price: Decimal::ZERO,
        }
    }

    /// A positive override pins the final price regardless of the base price.
    pub fn has_manual_override(&self) -> bool {
        self.manual_override_price.is_some_and(|p| p > Decimal::ZERO)
    }

    pub fn inputs(&self) -> PriceInputs {
        PriceInputs {
            base_price: self.base_price,
            platform_markup_pct: self.platform_markup_pct,
            dynamic_markup_pct: Some(self.dynamic_markup_pct),
            manual_override_price: self.manual_override_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: i32,
    pub name: String,
    pub pricing: PricingFields,
    pub stock: i32,
    pub is_active: bool,
    pub has_variants: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRecord {
    pub id: i32,
    pub product_id: i32,
    pub sku: String,
    pub attributes: VariantAttributes,
    pub pricing: PricingFields,
    pub stock: i32,
    pub is_active: bool,
}

/// Persisted outcome of a scheduled job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusRecord {
    pub job_name: String,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_count: i64,
    pub error_count: i64,
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Keyset page of active products with `id > after_id`, ascending by id.
    async fn active_products_page(
        &self,
        after_id: Option<i32>,
        limit: u64,
    ) -> PricingResult<Vec<ProductRecord>>;

    async fn find_product(&self, product_id: i32) -> PricingResult<Option<ProductRecord>>;

    async fn variants_for_product(&self, product_id: i32) -> PricingResult<Vec<VariantRecord>>;

    async fn update_product_pricing(&self, product_id: i32, pricing: &PricingFields) -> PricingResult<()>;

    async fn update_variant_pricing(&self, variant_id: i32, pricing: &PricingFields) -> PricingResult<()>;

    /// Overwrite the derived product-level price and stock of a variant product.
    async fn update_product_aggregate(
        &self,
        product_id: i32,
        final_price: Decimal,
        stock: i32,
    ) -> PricingResult<()>;

    async fn products_priced_above(&self, threshold: Decimal) -> PricingResult<Vec<ProductRecord>>;

    async fn variants_priced_above(&self, threshold: Decimal) -> PricingResult<Vec<VariantRecord>>;
}

#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Insert or replace the snapshot keyed by `(base, date)`.
    async fn upsert_snapshot(&self, snapshot: &RateSnapshot) -> PricingResult<()>;

    /// Most recent `date` for `base`, ties broken by `fetched_at`.
    async fn latest_snapshot(&self, base: &str) -> PricingResult<Option<RateSnapshot>>;

    async fn snapshot_for_date(&self, base: &str, date: NaiveDate) -> PricingResult<Option<RateSnapshot>>;

    async fn active_currencies(&self) -> PricingResult<Vec<CurrencyConfig>>;

    async fn find_currency(&self, code: &str) -> PricingResult<Option<CurrencyConfig>>;
}

#[async_trait]
pub trait JobStatusRepository: Send + Sync {
    async fn record_success(&self, job_name: &str, at: DateTime<Utc>) -> PricingResult<()>;

    async fn record_failure(&self, job_name: &str, at: DateTime<Utc>, error: &str) -> PricingResult<()>;

    async fn find(&self, job_name: &str) -> PricingResult<Option<JobStatusRecord>>;
}
