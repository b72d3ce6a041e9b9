//! `SeaORM` Entity for product_variants table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub product_id: i32,
    pub sku: String,
    /// `{"size": "M", "color": "Red"}` or `[{"key": .., "value": ..}]`
    pub attributes: Json,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub merchant_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))", nullable)]
    pub price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))", nullable)]
    pub discount_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))", nullable)]
    pub platform_markup_pct: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub dynamic_markup_pct: Decimal,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))", nullable)]
    pub manual_override_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub final_price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id"
    )]
    Products,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
