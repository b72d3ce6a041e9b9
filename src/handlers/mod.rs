pub mod demand;
pub mod exchange_rates;
pub mod jobs;
pub mod prices;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error::PricingError, models::common::ErrorResponse, AppState};

/// Map a service error onto the HTTP status handlers answer with.
pub fn error_response(error: PricingError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        PricingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PricingError::ProviderUnavailable { .. } | PricingError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    }

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

async fn health() -> &'static str {
    "Marketplace pricing service is running"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/exchange-rates/latest", get(exchange_rates::get_latest_rates))
        .route("/api/exchange-rates/{date}", get(exchange_rates::get_rates_for_date))
        .route("/api/admin/exchange-rates/refresh", post(exchange_rates::refresh_rates))
        .route("/api/prices/quote", get(prices::get_quote))
        .route("/api/products/{id}/price", get(prices::get_product_price))
        .route("/api/products/{id}/events", post(demand::record_event))
        .route("/api/admin/jobs", get(jobs::list_jobs))
        .route("/api/admin/jobs/{name}/run", post(jobs::run_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
