//! Rolls variant prices and stock up to the parent product.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::repository::VariantRecord;
use crate::services::attributes::VariantAttributes;

/// Product-level values derived from its variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductAggregate {
    pub final_price: Decimal,
    pub total_stock: i32,
}

/// Derive the representative price and total stock.
///
/// Stock sums every variant, visible or not. Price is the cheapest active,
/// in-stock variant, falling back to the cheapest variant overall. Returns
/// `None` when there are no variants (the product's own fields apply).
pub fn aggregate(variants: &[VariantRecord]) -> Option<ProductAggregate> {
    if variants.is_empty() {
        return None;
    }

    warn_on_duplicate_attributes(variants);

    let total_stock = variants
        .iter()
        .map(|v| v.stock.max(0))
        .fold(0i32, |acc, s| acc.saturating_add(s));

    let eligible_min = variants
        .iter()
        .filter(|v| v.is_active && v.stock > 0)
        .map(|v| v.pricing.final_price)
        .min();

    let final_price = eligible_min.or_else(|| variants.iter().map(|v| v.pricing.final_price).min())?;

    Some(ProductAggregate {
        final_price,
        total_stock,
    })
}

/// True when the stored product values differ from the derived ones.
pub fn needs_update(current_price: Decimal, current_stock: i32, aggregate: &ProductAggregate) -> bool {
    current_price != aggregate.final_price || current_stock != aggregate.total_stock
}

/// The active variant a shopper's attribute selection points at. Among
/// several matches the in-stock one with the lowest id wins.
pub fn find_variant<'a>(
    variants: &'a [VariantRecord],
    selection: &VariantAttributes,
) -> Option<&'a VariantRecord> {
    variants
        .iter()
        .filter(|v| v.is_active && v.attributes.matches(selection))
        .min_by_key(|v| (v.stock <= 0, v.id))
}

fn warn_on_duplicate_attributes(variants: &[VariantRecord]) {
    let mut seen: HashMap<String, i32> = HashMap::new();

    for variant in variants.iter().filter(|v| !v.attributes.is_empty()) {
        if let Some(first) = seen.insert(variant.attributes.canonical_key(), variant.id) {
            tracing::warn!(
                product_id = variant.product_id,
                "Variants {} and {} share attributes [{}]",
                first,
                variant.id,
                variant.attributes.canonical_key()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::PricingFields;
    use crate::services::attributes::VariantAttributes;
    use rust_decimal_macros::dec;

    fn variant(id: i32, final_price: Decimal, stock: i32, is_active: bool) -> VariantRecord {
        let mut pricing = PricingFields::new(final_price);
        pricing.final_price = final_price;
        VariantRecord {
            id,
            product_id: 1,
            sku: format!("SKU-{}", id),
            attributes: VariantAttributes::from_pairs([("size", id.to_string())]),
            pricing,
            stock,
            is_active,
        }
    }

    #[test]
    fn test_out_of_stock_variant_excluded() {
        let variants = vec![variant(1, dec!(50), 0, true), variant(2, dec!(70), 5, true)];

        let result = aggregate(&variants).unwrap();
        assert_eq!(result.final_price, dec!(70));
        assert_eq!(result.total_stock, 5);
    }

    #[test]
    fn test_inactive_variant_excluded_but_stock_counted() {
        let variants = vec![variant(1, dec!(30), 4, false), variant(2, dec!(45), 2, true)];

        let result = aggregate(&variants).unwrap();
        assert_eq!(result.final_price, dec!(45));
        assert_eq!(result.total_stock, 6);
    }

    #[test]
    fn test_falls_back_to_all_variants() {
        let variants = vec![variant(1, dec!(80), 0, true), variant(2, dec!(60), 3, false)];

        let result = aggregate(&variants).unwrap();
        assert_eq!(result.final_price, dec!(60));
        assert_eq!(result.total_stock, 3);
    }

    #[test]
    fn test_no_variants() {
        assert_eq!(aggregate(&[]), None);
    }

    #[test]
    fn test_needs_update_and_idempotence() {
        let variants = vec![variant(1, dec!(50), 0, true), variant(2, dec!(70), 5, true)];
        let first = aggregate(&variants).unwrap();
        let second = aggregate(&variants).unwrap();

        assert_eq!(first, second);
        assert!(!needs_update(dec!(70), 5, &first));
        assert!(needs_update(dec!(50), 5, &first));
        assert!(needs_update(dec!(70), 4, &first));
    }

    #[test]
    fn test_find_variant_by_selection() {
        let mut variants = vec![variant(1, dec!(50), 0, true), variant(2, dec!(70), 5, true)];
        variants[0].attributes = VariantAttributes::from_pairs([("size", "M"), ("color", "Red")]);
        variants[1].attributes = VariantAttributes::from_pairs([("size", "M"), ("color", "Blue")]);

        let blue = VariantAttributes::from_pairs([("COLOR", "blue")]);
        assert_eq!(find_variant(&variants, &blue).map(|v| v.id), Some(2));

        // both are size M; the sold-out one loses
        let medium = VariantAttributes::from_pairs([("size", "m")]);
        assert_eq!(find_variant(&variants, &medium).map(|v| v.id), Some(2));

        variants[1].is_active = false;
        assert!(find_variant(&variants, &blue).is_none());
        assert!(find_variant(&variants, &VariantAttributes::from_pairs([("size", "XL")])).is_none());
    }
}
