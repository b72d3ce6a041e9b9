use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn money(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col).decimal_len(18, 4).to_owned()
}

fn percent(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col).decimal_len(8, 2).to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(money(Products::MerchantPrice).not_null().default(0))
                    .col(money(Products::Price).null())
                    .col(money(Products::DiscountPrice).null())
                    .col(percent(Products::PlatformMarkupPct).null())
                    .col(percent(Products::DynamicMarkupPct).not_null().default(0))
                    .col(money(Products::ManualOverridePrice).null())
                    .col(money(Products::FinalPrice).not_null().default(0))
                    .col(ColumnDef::new(Products::Stock).integer().not_null().default(0))
                    .col(ColumnDef::new(Products::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Products::HasVariants).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProductVariants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductVariants::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProductVariants::ProductId).integer().not_null())
                    .col(ColumnDef::new(ProductVariants::Sku).string().not_null())
                    .col(
                        ColumnDef::new(ProductVariants::Attributes)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(money(ProductVariants::MerchantPrice).not_null().default(0))
                    .col(money(ProductVariants::Price).null())
                    .col(money(ProductVariants::DiscountPrice).null())
                    .col(percent(ProductVariants::PlatformMarkupPct).null())
                    .col(percent(ProductVariants::DynamicMarkupPct).not_null().default(0))
                    .col(money(ProductVariants::ManualOverridePrice).null())
                    .col(money(ProductVariants::FinalPrice).not_null().default(0))
                    .col(ColumnDef::new(ProductVariants::Stock).integer().not_null().default(0))
                    .col(ColumnDef::new(ProductVariants::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(ProductVariants::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_variants_product")
                            .from(ProductVariants::Table, ProductVariants::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_product_variants_product_id")
                    .table(ProductVariants::Table)
                    .col(ProductVariants::ProductId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_product_variants_sku")
                    .table(ProductVariants::Table)
                    .col(ProductVariants::Sku)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Normalization scans filter on final_price
        manager
            .create_index(
                Index::create()
                    .name("idx_products_final_price")
                    .table(Products::Table)
                    .col(Products::FinalPrice)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Name,
    MerchantPrice,
    Price,
    DiscountPrice,
    PlatformMarkupPct,
    DynamicMarkupPct,
    ManualOverridePrice,
    FinalPrice,
    Stock,
    IsActive,
    HasVariants,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProductVariants {
    Table,
    Id,
    ProductId,
    Sku,
    Attributes,
    MerchantPrice,
    Price,
    DiscountPrice,
    PlatformMarkupPct,
    DynamicMarkupPct,
    ManualOverridePrice,
    FinalPrice,
    Stock,
    IsActive,
    UpdatedAt,
}
