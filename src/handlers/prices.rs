use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{
    error::PricingError,
    handlers::error_response,
    models::{
        common::ErrorResponse,
        prices::{ProductPriceQuery, ProductPriceResponse, QuoteQuery},
    },
    services::{
        attributes::VariantAttributes,
        currency_converter::{ConvertedPrice, BASE_CURRENCY},
        variant_aggregator::find_variant,
    },
    AppState,
};

/// Handler for GET /api/prices/quote?amount=&currency=
pub async fn get_quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<ConvertedPrice>, (StatusCode, Json<ErrorResponse>)> {
    let amount = Decimal::from_str(query.amount.trim()).map_err(|_| {
        error_response(PricingError::InvalidInput(format!(
            "Invalid amount '{}'",
            query.amount
        )))
    })?;

    if amount < Decimal::ZERO {
        return Err(error_response(PricingError::InvalidInput(
            "Amount must not be negative".to_string(),
        )));
    }

    let currency = query.currency.trim();
    if currency.is_empty() {
        return Err(error_response(PricingError::InvalidInput(
            "Currency is required".to_string(),
        )));
    }

    Ok(Json(state.rate_store.quote(amount, currency).await))
}

fn not_found(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: message }))
}

/// Handler for GET /api/products/{id}/price?currency=&<attribute>=
///
/// Extra query parameters select a variant by its attributes.
pub async fn get_product_price(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    Query(query): Query<ProductPriceQuery>,
) -> Result<Json<ProductPriceResponse>, (StatusCode, Json<ErrorResponse>)> {
    let product = state
        .catalog
        .find_product(product_id)
        .await
        .map_err(error_response)?
        .filter(|p| p.is_active)
        .ok_or_else(|| not_found(format!("Product {} not found", product_id)))?;

    let selection = VariantAttributes::from_pairs(&query.attributes);
    let (variant_id, sku, final_price, stock) = if selection.is_empty() {
        (None, None, product.pricing.final_price, product.stock)
    } else {
        let variants = state
            .catalog
            .variants_for_product(product.id)
            .await
            .map_err(error_response)?;
        let variant = find_variant(&variants, &selection).ok_or_else(|| {
            not_found(format!(
                "No variant of product {} matches [{}]",
                product_id,
                selection.canonical_key()
            ))
        })?;
        (
            Some(variant.id),
            Some(variant.sku.clone()),
            variant.pricing.final_price,
            variant.stock,
        )
    };

    let currency = query.currency.as_deref().unwrap_or(BASE_CURRENCY);
    let display = state.rate_store.quote(final_price, currency).await;

    Ok(Json(ProductPriceResponse {
        product_id: product.id,
        variant_id,
        sku,
        name: product.name,
        final_price,
        stock,
        display,
    }))
}
