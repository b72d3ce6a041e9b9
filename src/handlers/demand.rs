use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    handlers::error_response,
    models::{
        common::ErrorResponse,
        demand::{DemandEventRequest, DemandEventResponse},
    },
    services::signal_scorer::dynamic_markup_pct,
    AppState,
};

/// Handler for POST /api/products/{id}/events
pub async fn record_event(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    Json(request): Json<DemandEventRequest>,
) -> Result<Json<DemandEventResponse>, (StatusCode, Json<ErrorResponse>)> {
    let product = state
        .catalog
        .find_product(product_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Product {} not found", product_id),
                }),
            )
        })?;

    state.demand.record(product_id, request.kind);

    let signals = state.demand.signals(product_id, product.stock);

    Ok(Json(DemandEventResponse {
        product_id,
        signals,
        dynamic_markup_pct: dynamic_markup_pct(&signals),
    }))
}
