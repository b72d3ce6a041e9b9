use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;

use crate::{
    handlers::error_response,
    models::{common::ErrorResponse, exchange_rates::LatestRatesResponse},
    services::rate_store::{RateSnapshot, RefreshReport},
    AppState,
};

/// Handler for GET /api/exchange-rates/latest
pub async fn get_latest_rates(
    State(state): State<AppState>,
) -> Result<Json<LatestRatesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = state.rate_store.latest().await.map_err(error_response)?;

    Ok(Json(LatestRatesResponse::from_snapshot(snapshot)))
}

/// Handler for GET /api/exchange-rates/{date}
pub async fn get_rates_for_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<RateSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid date '{}', expected YYYY-MM-DD", date),
            }),
        )
    })?;

    let snapshot = state
        .rate_store
        .snapshot_for(date)
        .await
        .map_err(error_response)?;

    snapshot.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No exchange rates stored for {}", date),
            }),
        )
    })
}

/// Handler for POST /api/admin/exchange-rates/refresh
///
/// Runs the fetch inline. A failed fetch is reported in the body, not as an
/// HTTP error.
pub async fn refresh_rates(State(state): State<AppState>) -> Json<RefreshReport> {
    tracing::info!("Admin requested exchange rate refresh");

    let report = state.rate_store.refresh(&state.fetcher).await;
    if !report.success {
        tracing::warn!("Admin exchange rate refresh failed: {:?}", report.errors);
    }

    Json(report)
}
