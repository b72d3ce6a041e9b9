use serde::Serialize;

use crate::services::rate_store::RateSnapshot;

/// Response for GET /api/exchange-rates/latest
#[derive(Debug, Serialize)]
pub struct LatestRatesResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub snapshot: Option<RateSnapshot>,
}

impl LatestRatesResponse {
    pub fn from_snapshot(snapshot: Option<RateSnapshot>) -> Self {
        match snapshot {
            Some(snapshot) => Self {
                available: true,
                message: None,
                snapshot: Some(snapshot),
            },
            None => Self {
                available: false,
                message: Some("No exchange rates available yet".to_string()),
                snapshot: None,
            },
        }
    }
}
