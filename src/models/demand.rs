use serde::{Deserialize, Serialize};

use crate::services::demand_tracker::DemandEventKind;
use crate::services::signal_scorer::DemandSignals;

#[derive(Debug, Deserialize)]
pub struct DemandEventRequest {
    pub kind: DemandEventKind,
}

#[derive(Debug, Serialize)]
pub struct DemandEventResponse {
    pub product_id: i32,
    pub signals: DemandSignals,
    /// Markup the next recalculation would apply at the current stock
    pub dynamic_markup_pct: u32,
}
