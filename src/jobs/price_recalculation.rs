use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PricingResult;
use crate::jobs::scheduler::{JobOutcome, ScheduledJob};
use crate::repository::{CatalogRepository, PricingFields, ProductRecord, VariantRecord};
use crate::services::demand_tracker::DemandTracker;
use crate::services::price_calculator::calculate_final_price;
use crate::services::signal_scorer::dynamic_markup_pct;
use crate::services::variant_aggregator::{aggregate, needs_update};

pub const JOB_NAME: &str = "price_recalculation";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalculationSummary {
    pub products_scanned: u64,
    pub variants_scanned: u64,
    pub products_updated: u64,
    pub variants_updated: u64,
    pub unchanged: u64,
    pub failed: u64,
}

impl From<RecalculationSummary> for JobOutcome {
    fn from(summary: RecalculationSummary) -> Self {
        JobOutcome::new()
            .with("products_scanned", summary.products_scanned)
            .with("variants_scanned", summary.variants_scanned)
            .with("products_updated", summary.products_updated)
            .with("variants_updated", summary.variants_updated)
            .with("unchanged", summary.unchanged)
            .with("failed", summary.failed)
    }
}

/// Recompute dynamic markup and final price for a pricing row.
///
/// Returns the new fields only when something changed.
fn reprice(pricing: &PricingFields, dynamic_pct: Decimal) -> Option<PricingFields> {
    let mut next = pricing.clone();
    next.dynamic_markup_pct = dynamic_pct;
    next.final_price = calculate_final_price(&next.inputs());

    (next != *pricing).then_some(next)
}

fn stock_of(stock: i32) -> i32 {
    stock.max(0)
}

pub struct PriceRecalculationJob {
    catalog: Arc<dyn CatalogRepository>,
    demand: Arc<DemandTracker>,
    page_size: u64,
    interval: Duration,
}

impl PriceRecalculationJob {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        demand: Arc<DemandTracker>,
        page_size: u64,
        interval: Duration,
    ) -> Self {
        Self {
            catalog,
            demand,
            page_size: page_size.max(1),
            interval,
        }
    }

    /// One pass over every active product, page by page.
    /// A failing product is counted and logged; the pass continues.
    pub async fn recalculate_catalog(&self) -> PricingResult<RecalculationSummary> {
        let mut summary = RecalculationSummary::default();
        let mut after_id = None;

        loop {
            let page = self
                .catalog
                .active_products_page(after_id, self.page_size)
                .await?;

            for product in &page {
                summary.products_scanned += 1;
                if let Err(e) = self.recalculate_product(product, &mut summary).await {
                    summary.failed += 1;
                    tracing::error!(product_id = product.id, "Failed to recalculate price: {}", e);
                }
            }

            match page.last() {
                Some(last) if page.len() as u64 == self.page_size => after_id = Some(last.id),
                _ => break,
            }
        }

        let pruned = self.demand.prune(Utc::now());
        if pruned > 0 {
            tracing::debug!("Pruned {} expired demand events", pruned);
        }

        Ok(summary)
    }

    async fn recalculate_product(
        &self,
        product: &ProductRecord,
        summary: &mut RecalculationSummary,
    ) -> PricingResult<()> {
        if product.has_variants {
            let variants = self.catalog.variants_for_product(product.id).await?;
            if !variants.is_empty() {
                return self.recalculate_variants(product, variants, summary).await;
            }
            tracing::warn!(product_id = product.id, "Product flagged with variants has none, pricing as simple");
        }

        let signals = self.demand.signals(product.id, stock_of(product.stock));
        let dynamic = Decimal::from(dynamic_markup_pct(&signals));

        match reprice(&product.pricing, dynamic) {
            Some(pricing) => {
                self.catalog.update_product_pricing(product.id, &pricing).await?;
                summary.products_updated += 1;
                tracing::debug!(
                    product_id = product.id,
                    dynamic_markup_pct = %pricing.dynamic_markup_pct,
                    final_price = %pricing.final_price,
                    "Product repriced"
                );
            }
            None => summary.unchanged += 1,
        }

        Ok(())
    }

    async fn recalculate_variants(
        &self,
        product: &ProductRecord,
        mut variants: Vec<VariantRecord>,
        summary: &mut RecalculationSummary,
    ) -> PricingResult<()> {
        for variant in variants.iter_mut() {
            summary.variants_scanned += 1;

            let signals = self.demand.signals(product.id, stock_of(variant.stock));
            let dynamic = Decimal::from(dynamic_markup_pct(&signals));

            match reprice(&variant.pricing, dynamic) {
                Some(pricing) => {
                    self.catalog.update_variant_pricing(variant.id, &pricing).await?;
                    summary.variants_updated += 1;
                    variant.pricing = pricing;
                }
                None => summary.unchanged += 1,
            }
        }

        let Some(aggregate) = aggregate(&variants) else {
            return Ok(());
        };

        if needs_update(product.pricing.final_price, product.stock, &aggregate) {
            self.catalog
                .update_product_aggregate(product.id, aggregate.final_price, aggregate.total_stock)
                .await?;
            summary.products_updated += 1;
            tracing::debug!(
                product_id = product.id,
                final_price = %aggregate.final_price,
                total_stock = aggregate.total_stock,
                "Product aggregate synced from variants"
            );
        } else {
            summary.unchanged += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl ScheduledJob for PriceRecalculationJob {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> PricingResult<JobOutcome> {
        Ok(self.recalculate_catalog().await?.into())
    }
}
