//! `SeaORM` Entity for currencies table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "currencies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub decimals: i32,
    pub symbol: String,
    /// "before" | "after"
    pub symbol_position: String,
    /// NONE, NEAREST_1, NEAREST_5, NEAREST_10, ENDING_9, CUSTOM
    pub rounding_strategy: String,
    pub custom_rounding_rules: Json,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub market_markup_adjustment_pct: Decimal,
    pub allow_manual_rate: bool,
    #[sea_orm(column_type = "Decimal(Some((24, 10)))", nullable)]
    pub manual_rate: Option<Decimal>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
