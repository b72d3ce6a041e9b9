//! `SeaORM` Entity for exchange_rates table (one row per base + date)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub base: String,
    pub date: Date,
    /// `{"EUR": "0.92", ...}`
    pub rates: Json,
    pub provider: String,
    pub fetch_status: String,
    pub fetch_errors: Json,
    pub missing_currencies: Json,
    pub fetched_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
