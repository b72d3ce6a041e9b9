use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::services::currency_converter::ConvertedPrice;

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub amount: String,
    pub currency: String,
}

/// `currency` plus any number of variant attributes (`?size=M&color=Red`).
#[derive(Debug, Deserialize)]
pub struct ProductPriceQuery {
    pub currency: Option<String>,
    #[serde(flatten)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ProductPriceResponse {
    pub product_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub name: String,
    pub final_price: Decimal,
    pub stock: i32,
    pub display: ConvertedPrice,
}
