//! SeaORM (Postgres) implementations of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::BTreeMap;

use super::{
    CatalogRepository, JobStatusRecord, JobStatusRepository, PricingFields, ProductRecord,
    RateRepository, VariantRecord,
};
use crate::entities::{currencies, exchange_rates, prelude::*, product_variants, products, sync_status};
use crate::error::PricingResult;
use crate::services::attributes::VariantAttributes;
use crate::services::currency_converter::{
    CurrencyConfig, CustomRoundingRule, PriceRounding, SymbolPosition,
};
use crate::services::rate_fetcher::FetchStatus;
use crate::services::rate_store::RateSnapshot;

fn product_pricing(model: &products::Model) -> PricingFields {
    PricingFields {
        base_price: model.merchant_price,
        list_price: model.price,
        discount_price: model.discount_price,
        platform_markup_pct: model.platform_markup_pct,
        dynamic_markup_pct: model.dynamic_markup_pct,
        manual_override_price: model.manual_override_price,
        final_price: model.final_price,
    }
}

impl From<products::Model> for ProductRecord {
    fn from(model: products::Model) -> Self {
        Self {
            pricing: product_pricing(&model),
            id: model.id,
            name: model.name,
            stock: model.stock,
            is_active: model.is_active,
            has_variants: model.has_variants,
        }
    }
}

impl From<product_variants::Model> for VariantRecord {
    fn from(model: product_variants::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            attributes: VariantAttributes::from_json(&model.attributes),
            pricing: PricingFields {
                base_price: model.merchant_price,
                list_price: model.price,
                discount_price: model.discount_price,
                platform_markup_pct: model.platform_markup_pct,
                dynamic_markup_pct: model.dynamic_markup_pct,
                manual_override_price: model.manual_override_price,
                final_price: model.final_price,
            },
            sku: model.sku,
            stock: model.stock,
            is_active: model.is_active,
        }
    }
}

impl From<currencies::Model> for CurrencyConfig {
    fn from(model: currencies::Model) -> Self {
        let rounding = PriceRounding::from_str(&model.rounding_strategy).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown rounding strategy '{}' for {}, using NONE",
                model.rounding_strategy,
                model.code
            );
            PriceRounding::None
        });

        let custom_rounding_rules: Vec<CustomRoundingRule> =
            match serde_json::from_value(model.custom_rounding_rules.clone()) {
                Ok(rules) => rules,
                Err(e) if !model.custom_rounding_rules.is_null() => {
                    tracing::warn!("Invalid custom rounding rules for {}: {}", model.code, e);
                    Vec::new()
                }
                Err(_) => Vec::new(),
            };

        Self {
            decimals: model.decimals.max(0) as u32,
            symbol_position: SymbolPosition::from_str(&model.symbol_position).unwrap_or_default(),
            code: model.code.to_uppercase(),
            symbol: model.symbol,
            rounding,
            custom_rounding_rules,
            market_markup_adjustment_pct: model.market_markup_adjustment_pct,
            allow_manual_rate: model.allow_manual_rate,
            manual_rate: model.manual_rate,
            is_active: model.is_active,
        }
    }
}

fn json_strings(value: &serde_json::Value) -> Vec<String> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

impl From<exchange_rates::Model> for RateSnapshot {
    fn from(model: exchange_rates::Model) -> Self {
        let rates: BTreeMap<String, Decimal> =
            serde_json::from_value(model.rates.clone()).unwrap_or_else(|e| {
                tracing::warn!("Unreadable rates for {} ({}): {}", model.date, model.base, e);
                BTreeMap::new()
            });

        Self {
            fetch_status: FetchStatus::from_str(&model.fetch_status).unwrap_or(FetchStatus::Success),
            fetch_errors: json_strings(&model.fetch_errors),
            missing_currencies: json_strings(&model.missing_currencies),
            fetched_at: model.fetched_at.and_utc(),
            base: model.base,
            date: model.date,
            rates,
            provider: model.provider,
        }
    }
}

#[derive(Clone)]
pub struct PgCatalogRepository {
    db: DatabaseConnection,
}

impl PgCatalogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn active_products_page(
        &self,
        after_id: Option<i32>,
        limit: u64,
    ) -> PricingResult<Vec<ProductRecord>> {
        let mut query = Products::find().filter(products::Column::IsActive.eq(true));
        if let Some(after_id) = after_id {
            query = query.filter(products::Column::Id.gt(after_id));
        }

        let rows = query
            .order_by(products::Column::Id, Order::Asc)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn find_product(&self, product_id: i32) -> PricingResult<Option<ProductRecord>> {
        let row = Products::find_by_id(product_id).one(&self.db).await?;
        Ok(row.map(ProductRecord::from))
    }

    async fn variants_for_product(&self, product_id: i32) -> PricingResult<Vec<VariantRecord>> {
        let rows = ProductVariants::find()
            .filter(product_variants::Column::ProductId.eq(product_id))
            .order_by(product_variants::Column::Id, Order::Asc)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(VariantRecord::from).collect())
    }

    async fn update_product_pricing(&self, product_id: i32, pricing: &PricingFields) -> PricingResult<()> {
        products::ActiveModel {
            id: Set(product_id),
            merchant_price: Set(pricing.base_price),
            price: Set(pricing.list_price),
            discount_price: Set(pricing.discount_price),
            platform_markup_pct: Set(pricing.platform_markup_pct),
            dynamic_markup_pct: Set(pricing.dynamic_markup_pct),
            manual_override_price: Set(pricing.manual_override_price),
            final_price: Set(pricing.final_price),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;

        Ok(())
    }

    async fn update_variant_pricing(&self, variant_id: i32, pricing: &PricingFields) -> PricingResult<()> {
        product_variants::ActiveModel {
            id: Set(variant_id),
            merchant_price: Set(pricing.base_price),
            price: Set(pricing.list_price),
            discount_price: Set(pricing.discount_price),
            platform_markup_pct: Set(pricing.platform_markup_pct),
            dynamic_markup_pct: Set(pricing.dynamic_markup_pct),
            manual_override_price: Set(pricing.manual_override_price),
            final_price: Set(pricing.final_price),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;

        Ok(())
    }

    async fn update_product_aggregate(
        &self,
        product_id: i32,
        final_price: Decimal,
        stock: i32,
    ) -> PricingResult<()> {
        products::ActiveModel {
            id: Set(product_id),
            final_price: Set(final_price),
            stock: Set(stock),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .update(&self.db)
        .await?;

        Ok(())
    }

    async fn products_priced_above(&self, threshold: Decimal) -> PricingResult<Vec<ProductRecord>> {
        let rows = Products::find()
            .filter(products::Column::FinalPrice.gt(threshold))
            .order_by(products::Column::Id, Order::Asc)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn variants_priced_above(&self, threshold: Decimal) -> PricingResult<Vec<VariantRecord>> {
        let rows = ProductVariants::find()
            .filter(product_variants::Column::FinalPrice.gt(threshold))
            .order_by(product_variants::Column::Id, Order::Asc)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(VariantRecord::from).collect())
    }
}

#[derive(Clone)]
pub struct PgRateRepository {
    db: DatabaseConnection,
}

impl PgRateRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RateRepository for PgRateRepository {
    async fn upsert_snapshot(&self, snapshot: &RateSnapshot) -> PricingResult<()> {
        let row = exchange_rates::ActiveModel {
            base: Set(snapshot.base.clone()),
            date: Set(snapshot.date),
            rates: Set(serde_json::to_value(&snapshot.rates).map_err(|e| e.to_string())?),
            provider: Set(snapshot.provider.clone()),
            fetch_status: Set(snapshot.fetch_status.as_str().to_string()),
            fetch_errors: Set(serde_json::json!(snapshot.fetch_errors)),
            missing_currencies: Set(serde_json::json!(snapshot.missing_currencies)),
            fetched_at: Set(snapshot.fetched_at.naive_utc()),
            ..Default::default()
        };

        ExchangeRates::insert(row)
            .on_conflict(
                OnConflict::columns([exchange_rates::Column::Base, exchange_rates::Column::Date])
                    .update_columns([
                        exchange_rates::Column::Rates,
                        exchange_rates::Column::Provider,
                        exchange_rates::Column::FetchStatus,
                        exchange_rates::Column::FetchErrors,
                        exchange_rates::Column::MissingCurrencies,
                        exchange_rates::Column::FetchedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn latest_snapshot(&self, base: &str) -> PricingResult<Option<RateSnapshot>> {
        let row = ExchangeRates::find()
            .filter(exchange_rates::Column::Base.eq(base.to_uppercase()))
            .order_by(exchange_rates::Column::Date, Order::Desc)
            .order_by(exchange_rates::Column::FetchedAt, Order::Desc)
            .limit(1)
            .one(&self.db)
            .await?;

        Ok(row.map(RateSnapshot::from))
    }

    async fn snapshot_for_date(&self, base: &str, date: NaiveDate) -> PricingResult<Option<RateSnapshot>> {
        let row = ExchangeRates::find()
            .filter(exchange_rates::Column::Base.eq(base.to_uppercase()))
            .filter(exchange_rates::Column::Date.eq(date))
            .one(&self.db)
            .await?;

        Ok(row.map(RateSnapshot::from))
    }

    async fn active_currencies(&self) -> PricingResult<Vec<CurrencyConfig>> {
        let rows = Currencies::find()
            .filter(currencies::Column::IsActive.eq(true))
            .order_by(currencies::Column::Code, Order::Asc)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(CurrencyConfig::from).collect())
    }

    async fn find_currency(&self, code: &str) -> PricingResult<Option<CurrencyConfig>> {
        let row = Currencies::find_by_id(code.to_uppercase()).one(&self.db).await?;
        Ok(row.map(CurrencyConfig::from))
    }
}

#[derive(Clone)]
pub struct PgJobStatusRepository {
    db: DatabaseConnection,
}

impl PgJobStatusRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_model(&self, job_name: &str) -> PricingResult<Option<sync_status::Model>> {
        Ok(SyncStatus::find()
            .filter(sync_status::Column::JobName.eq(job_name))
            .one(&self.db)
            .await?)
    }
}

#[async_trait]
impl JobStatusRepository for PgJobStatusRepository {
    async fn record_success(&self, job_name: &str, at: DateTime<Utc>) -> PricingResult<()> {
        let now = at.naive_utc();

        match self.find_model(job_name).await? {
            Some(record) => {
                let success_count = record.success_count + 1;
                let mut active_model: sync_status::ActiveModel = record.into();
                active_model.last_success_at = Set(Some(now));
                active_model.last_attempt_at = Set(Some(now));
                active_model.last_error = Set(None);
                active_model.success_count = Set(success_count);
                active_model.update(&self.db).await?;
            }
            None => {
                sync_status::ActiveModel {
                    job_name: Set(job_name.to_string()),
                    last_success_at: Set(Some(now)),
                    last_attempt_at: Set(Some(now)),
                    last_error: Set(None),
                    success_count: Set(1),
                    error_count: Set(0),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?;
            }
        }

        tracing::debug!("[{}] Recorded successful run", job_name);
        Ok(())
    }

    async fn record_failure(&self, job_name: &str, at: DateTime<Utc>, error: &str) -> PricingResult<()> {
        let now = at.naive_utc();

        match self.find_model(job_name).await? {
            Some(record) => {
                let error_count = record.error_count + 1;
                let mut active_model: sync_status::ActiveModel = record.into();
                active_model.last_attempt_at = Set(Some(now));
                active_model.last_error = Set(Some(error.to_string()));
                active_model.error_count = Set(error_count);
                active_model.update(&self.db).await?;
            }
            None => {
                sync_status::ActiveModel {
                    job_name: Set(job_name.to_string()),
                    last_success_at: Set(None),
                    last_attempt_at: Set(Some(now)),
                    last_error: Set(Some(error.to_string())),
                    success_count: Set(0),
                    error_count: Set(1),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?;
            }
        }

        tracing::debug!("[{}] Recorded failed run: {}", job_name, error);
        Ok(())
    }

    async fn find(&self, job_name: &str) -> PricingResult<Option<JobStatusRecord>> {
        Ok(self.find_model(job_name).await?.map(|record| JobStatusRecord {
            job_name: record.job_name,
            last_success_at: record.last_success_at.map(|t| t.and_utc()),
            last_attempt_at: record.last_attempt_at.map(|t| t.and_utc()),
            last_error: record.last_error,
            success_count: record.success_count,
            error_count: record.error_count,
        }))
    }
}
