//! In-process repositories backed by `parking_lot` locks.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    CatalogRepository, JobStatusRecord, JobStatusRepository, PricingFields, ProductRecord,
    RateRepository, VariantRecord,
};
use crate::error::{PricingError, PricingResult};
use crate::services::currency_converter::CurrencyConfig;
use crate::services::rate_store::RateSnapshot;

#[derive(Default)]
pub struct MemoryCatalogRepository {
    products: RwLock<BTreeMap<i32, ProductRecord>>,
    variants: RwLock<BTreeMap<i32, VariantRecord>>,
    writes: AtomicUsize,
}

impl MemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&self, product: ProductRecord) {
        self.products.write().insert(product.id, product);
    }

    pub fn insert_variant(&self, variant: VariantRecord) {
        self.variants.write().insert(variant.id, variant);
    }

    pub fn product(&self, id: i32) -> Option<ProductRecord> {
        self.products.read().get(&id).cloned()
    }

    pub fn variant(&self, id: i32) -> Option<VariantRecord> {
        self.variants.read().get(&id).cloned()
    }

    /// Number of update calls served so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn not_found(kind: &str, id: i32) -> PricingError {
    PricingError::Other(format!("{} {} not found", kind, id))
}

#[async_trait]
impl CatalogRepository for MemoryCatalogRepository {
    async fn active_products_page(
        &self,
        after_id: Option<i32>,
        limit: u64,
    ) -> PricingResult<Vec<ProductRecord>> {
        let products = self.products.read();
        let start = after_id.map(|id| id.saturating_add(1)).unwrap_or(i32::MIN);

        Ok(products
            .range(start..)
            .map(|(_, p)| p)
            .filter(|p| p.is_active)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_product(&self, product_id: i32) -> PricingResult<Option<ProductRecord>> {
        Ok(self.product(product_id))
    }

    async fn variants_for_product(&self, product_id: i32) -> PricingResult<Vec<VariantRecord>> {
        Ok(self
            .variants
            .read()
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn update_product_pricing(&self, product_id: i32, pricing: &PricingFields) -> PricingResult<()> {
        let mut products = self.products.write();
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| not_found("Product", product_id))?;
        product.pricing = pricing.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_variant_pricing(&self, variant_id: i32, pricing: &PricingFields) -> PricingResult<()> {
        let mut variants = self.variants.write();
        let variant = variants
            .get_mut(&variant_id)
            .ok_or_else(|| not_found("Variant", variant_id))?;
        variant.pricing = pricing.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_product_aggregate(
        &self,
        product_id: i32,
        final_price: Decimal,
        stock: i32,
    ) -> PricingResult<()> {
        let mut products = self.products.write();
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| not_found("Product", product_id))?;
        product.pricing.final_price = final_price;
        product.stock = stock;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn products_priced_above(&self, threshold: Decimal) -> PricingResult<Vec<ProductRecord>> {
        Ok(self
            .products
            .read()
            .values()
            .filter(|p| p.pricing.final_price > threshold)
            .cloned()
            .collect())
    }

    async fn variants_priced_above(&self, threshold: Decimal) -> PricingResult<Vec<VariantRecord>> {
        Ok(self
            .variants
            .read()
            .values()
            .filter(|v| v.pricing.final_price > threshold)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryRateRepository {
    snapshots: RwLock<HashMap<(String, NaiveDate), RateSnapshot>>,
    currencies: RwLock<BTreeMap<String, CurrencyConfig>>,
}

impl MemoryRateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_currency(&self, config: CurrencyConfig) {
        self.currencies.write().insert(config.code.to_uppercase(), config);
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.read().len()
    }
}

#[async_trait]
impl RateRepository for MemoryRateRepository {
    async fn upsert_snapshot(&self, snapshot: &RateSnapshot) -> PricingResult<()> {
        self.snapshots
            .write()
            .insert((snapshot.base.clone(), snapshot.date), snapshot.clone());
        Ok(())
    }

    async fn latest_snapshot(&self, base: &str) -> PricingResult<Option<RateSnapshot>> {
        let base = base.to_uppercase();
        Ok(self
            .snapshots
            .read()
            .values()
            .filter(|s| s.base == base)
            .max_by_key(|s| (s.date, s.fetched_at))
            .cloned())
    }

    async fn snapshot_for_date(&self, base: &str, date: NaiveDate) -> PricingResult<Option<RateSnapshot>> {
        Ok(self
            .snapshots
            .read()
            .get(&(base.to_uppercase(), date))
            .cloned())
    }

    async fn active_currencies(&self) -> PricingResult<Vec<CurrencyConfig>> {
        Ok(self
            .currencies
            .read()
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn find_currency(&self, code: &str) -> PricingResult<Option<CurrencyConfig>> {
        Ok(self.currencies.read().get(&code.to_uppercase()).cloned())
    }
}

#[derive(Default)]
pub struct MemoryJobStatusRepository {
    records: RwLock<HashMap<String, JobStatusRecord>>,
}

impl MemoryJobStatusRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry<F>(&self, job_name: &str, update: F)
    where
        F: FnOnce(&mut JobStatusRecord),
    {
        let mut records = self.records.write();
        let record = records
            .entry(job_name.to_string())
            .or_insert_with(|| JobStatusRecord {
                job_name: job_name.to_string(),
                last_success_at: None,
                last_attempt_at: None,
                last_error: None,
                success_count: 0,
                error_count: 0,
            });
        update(record);
    }
}

#[async_trait]
impl JobStatusRepository for MemoryJobStatusRepository {
    async fn record_success(&self, job_name: &str, at: DateTime<Utc>) -> PricingResult<()> {
        self.entry(job_name, |record| {
            record.last_success_at = Some(at);
            record.last_attempt_at = Some(at);
            record.last_error = None;
            record.success_count += 1;
        });
        Ok(())
    }

    async fn record_failure(&self, job_name: &str, at: DateTime<Utc>, error: &str) -> PricingResult<()> {
        self.entry(job_name, |record| {
            record.last_attempt_at = Some(at);
            record.last_error = Some(error.to_string());
            record.error_count += 1;
        });
        Ok(())
    }

    async fn find(&self, job_name: &str) -> PricingResult<Option<JobStatusRecord>> {
        Ok(self.records.read().get(job_name).cloned())
    }
}
