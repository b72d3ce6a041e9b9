//! Repair pass for prices stored a hundred times too large.
//!
//! Items whose final price exceeds the threshold get their merchant, list and
//! discount prices divided by 100 and their final price recomputed. Variant
//! products are then re-synced from their variants.
//!
//! Items with a manual override are left alone: the override keeps their final
//! price above the threshold, so they would be divided again on every run.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::PricingResult;
use crate::repository::{CatalogRepository, PricingFields};
use crate::services::price_calculator::calculate_final_price;
use crate::services::variant_aggregator::{aggregate, needs_update};

pub const DEFAULT_THRESHOLD: Decimal = dec!(1000);

const SCALE_DIVISOR: Decimal = dec!(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Product,
    Variant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceCorrection {
    pub kind: ItemKind,
    pub id: i32,
    pub product_id: i32,
    pub before: PricingFields,
    pub after: PricingFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductResync {
    pub product_id: i32,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub total_stock: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizationReport {
    pub dry_run: bool,
    pub threshold: Decimal,
    pub corrections: Vec<PriceCorrection>,
    pub resyncs: Vec<ProductResync>,
    pub applied: usize,
    pub failed: usize,
    pub skipped_overrides: usize,
}

/// Divide the stored money fields by 100 and recompute the final price.
pub fn normalize_fields(pricing: &PricingFields) -> PricingFields {
    let mut next = pricing.clone();
    next.base_price = pricing.base_price / SCALE_DIVISOR;
    next.list_price = pricing.list_price.map(|p| p / SCALE_DIVISOR);
    next.discount_price = pricing.discount_price.map(|p| p / SCALE_DIVISOR);
    next.final_price = calculate_final_price(&next.inputs());
    next
}

pub struct PriceNormalizer {
    catalog: Arc<dyn CatalogRepository>,
    threshold: Decimal,
}

impl PriceNormalizer {
    pub fn new(catalog: Arc<dyn CatalogRepository>, threshold: Decimal) -> Self {
        Self { catalog, threshold }
    }

    /// Scan and correct. With `apply == false` nothing is written.
    pub async fn run(&self, apply: bool) -> PricingResult<NormalizationReport> {
        let mut report = NormalizationReport {
            dry_run: !apply,
            threshold: self.threshold,
            ..Default::default()
        };

        let mut resync_ids = BTreeSet::new();

        for product in self.catalog.products_priced_above(self.threshold).await? {
            if product.has_variants {
                resync_ids.insert(product.id);
                continue;
            }
            if product.pricing.has_manual_override() {
                report.skipped_overrides += 1;
                tracing::debug!(product_id = product.id, "Skipping product with manual override");
                continue;
            }

            let after = normalize_fields(&product.pricing);
            if apply {
                match self.catalog.update_product_pricing(product.id, &after).await {
                    Ok(()) => report.applied += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(product_id = product.id, "Failed to normalize product: {}", e);
                        continue;
                    }
                }
            }

            report.corrections.push(PriceCorrection {
                kind: ItemKind::Product,
                id: product.id,
                product_id: product.id,
                before: product.pricing,
                after,
            });
        }

        let mut corrected_variants: HashMap<i32, PricingFields> = HashMap::new();

        for variant in self.catalog.variants_priced_above(self.threshold).await? {
            if variant.pricing.has_manual_override() {
                report.skipped_overrides += 1;
                tracing::debug!(variant_id = variant.id, "Skipping variant with manual override");
                continue;
            }

            let after = normalize_fields(&variant.pricing);
            if apply {
                match self.catalog.update_variant_pricing(variant.id, &after).await {
                    Ok(()) => report.applied += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(variant_id = variant.id, "Failed to normalize variant: {}", e);
                        continue;
                    }
                }
            }

            resync_ids.insert(variant.product_id);
            corrected_variants.insert(variant.id, after.clone());
            report.corrections.push(PriceCorrection {
                kind: ItemKind::Variant,
                id: variant.id,
                product_id: variant.product_id,
                before: variant.pricing,
                after,
            });
        }

        for product_id in resync_ids {
            if let Err(e) = self
                .resync_product(product_id, apply, &corrected_variants, &mut report)
                .await
            {
                report.failed += 1;
                tracing::error!(product_id = product_id, "Failed to re-sync product from variants: {}", e);
            }
        }

        Ok(report)
    }

    async fn resync_product(
        &self,
        product_id: i32,
        apply: bool,
        corrected_variants: &HashMap<i32, PricingFields>,
        report: &mut NormalizationReport,
    ) -> PricingResult<()> {
        let Some(product) = self.catalog.find_product(product_id).await? else {
            tracing::warn!(product_id = product_id, "Variant references a missing product");
            return Ok(());
        };

        let mut variants = self.catalog.variants_for_product(product_id).await?;
        if !apply {
            // dry run: aggregate over the values that would have been written
            for variant in variants.iter_mut() {
                if let Some(pricing) = corrected_variants.get(&variant.id) {
                    variant.pricing = pricing.clone();
                }
            }
        }

        let Some(aggregate) = aggregate(&variants) else {
            tracing::warn!(product_id = product_id, "Product has no variants to re-sync from");
            return Ok(());
        };

        if !needs_update(product.pricing.final_price, product.stock, &aggregate) {
            return Ok(());
        }

        if apply {
            self.catalog
                .update_product_aggregate(product_id, aggregate.final_price, aggregate.total_stock)
                .await?;
            report.applied += 1;
        }

        report.resyncs.push(ProductResync {
            product_id,
            old_price: product.pricing.final_price,
            new_price: aggregate.final_price,
            total_stock: aggregate.total_stock,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryCatalogRepository;
    use crate::repository::{ProductRecord, VariantRecord};
    use crate::services::attributes::VariantAttributes;

    fn inflated(base: Decimal) -> PricingFields {
        let mut pricing = PricingFields::new(base);
        pricing.list_price = Some(base * dec!(1.2));
        pricing.discount_price = Some(base * dec!(0.9));
        pricing.final_price = calculate_final_price(&pricing.inputs());
        pricing
    }

    fn simple(id: i32, pricing: PricingFields) -> ProductRecord {
        ProductRecord {
            id,
            name: format!("Product {}", id),
            pricing,
            stock: 10,
            is_active: true,
            has_variants: false,
        }
    }

    #[test]
    fn test_normalize_fields_scales_and_recomputes() {
        let after = normalize_fields(&inflated(dec!(450000)));

        assert_eq!(after.base_price, dec!(4500));
        assert_eq!(after.list_price, Some(dec!(5400)));
        assert_eq!(after.discount_price, Some(dec!(4050)));
        assert_eq!(after.final_price, dec!(4950));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let catalog = Arc::new(MemoryCatalogRepository::new());
        catalog.insert_product(simple(1, inflated(dec!(250000))));
        catalog.insert_product(simple(2, inflated(dec!(20))));

        let report = PriceNormalizer::new(catalog.clone(), DEFAULT_THRESHOLD)
            .run(false)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.corrections.len(), 1);
        assert_eq!(report.corrections[0].after.final_price, dec!(2750));
        assert_eq!(report.applied, 0);
        assert_eq!(catalog.write_count(), 0);
    }

    #[tokio::test]
    async fn test_apply_corrects_variants_and_resyncs_product() {
        let catalog = Arc::new(MemoryCatalogRepository::new());
        let mut parent = simple(1, PricingFields::new(Decimal::ZERO));
        parent.has_variants = true;
        parent.pricing.final_price = dec!(5500);
        catalog.insert_product(parent);

        for (id, base, size) in [(10, dec!(5000), "S"), (11, dec!(7000), "M")] {
            catalog.insert_variant(VariantRecord {
                id,
                product_id: 1,
                sku: format!("SKU-{}", id),
                attributes: VariantAttributes::from_pairs([("size", size)]),
                pricing: inflated(base),
                stock: 4,
                is_active: true,
            });
        }

        let report = PriceNormalizer::new(catalog.clone(), DEFAULT_THRESHOLD)
            .run(true)
            .await
            .unwrap();

        assert_eq!(report.corrections.len(), 2);
        assert_eq!(catalog.variant(10).unwrap().pricing.final_price, dec!(55));
        assert_eq!(catalog.variant(11).unwrap().pricing.final_price, dec!(77));

        let product = catalog.product(1).unwrap();
        assert_eq!(product.pricing.final_price, dec!(55));
        assert_eq!(product.stock, 8);
        assert_eq!(report.resyncs.len(), 1);
        assert_eq!(report.applied, 3);

        let again = PriceNormalizer::new(catalog.clone(), DEFAULT_THRESHOLD)
            .run(true)
            .await
            .unwrap();
        assert!(again.corrections.is_empty());
        assert!(again.resyncs.is_empty());
    }

    #[tokio::test]
    async fn test_overridden_items_are_never_rescaled() {
        let catalog = Arc::new(MemoryCatalogRepository::new());
        let mut pricing = PricingFields::new(dec!(1400));
        pricing.manual_override_price = Some(dec!(1500));
        pricing.final_price = calculate_final_price(&pricing.inputs());
        catalog.insert_product(simple(1, pricing.clone()));

        let mut parent = simple(2, PricingFields::new(Decimal::ZERO));
        parent.has_variants = true;
        parent.pricing.final_price = dec!(1500);
        catalog.insert_product(parent);
        catalog.insert_variant(VariantRecord {
            id: 20,
            product_id: 2,
            sku: "SKU-20".to_string(),
            attributes: VariantAttributes::from_pairs([("size", "M")]),
            pricing: pricing.clone(),
            stock: 3,
            is_active: true,
        });

        let normalizer = PriceNormalizer::new(catalog.clone(), DEFAULT_THRESHOLD);
        for _ in 0..3 {
            let report = normalizer.run(true).await.unwrap();
            assert!(report.corrections.is_empty());
            assert_eq!(report.skipped_overrides, 2);
        }

        assert_eq!(catalog.product(1).unwrap().pricing, pricing);
        assert_eq!(catalog.variant(20).unwrap().pricing, pricing);
        assert_eq!(catalog.product(2).unwrap().stock, 3);
    }
}
