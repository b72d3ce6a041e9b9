use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Currencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Currencies::Code)
                            .string_len(8)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Currencies::Decimals).integer().not_null().default(2))
                    .col(ColumnDef::new(Currencies::Symbol).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Currencies::SymbolPosition)
                            .string_len(10)
                            .not_null()
                            .default("before"),
                    )
                    .col(
                        ColumnDef::new(Currencies::RoundingStrategy)
                            .string_len(20)
                            .not_null()
                            .default("NONE"),
                    )
                    .col(
                        ColumnDef::new(Currencies::CustomRoundingRules)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Currencies::MarketMarkupAdjustmentPct)
                            .decimal_len(8, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Currencies::AllowManualRate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Currencies::ManualRate).decimal_len(24, 10).null())
                    .col(ColumnDef::new(Currencies::IsActive).boolean().not_null().default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExchangeRates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExchangeRates::Base).string_len(8).not_null())
                    .col(ColumnDef::new(ExchangeRates::Date).date().not_null())
                    .col(ColumnDef::new(ExchangeRates::Rates).json_binary().not_null())
                    .col(ColumnDef::new(ExchangeRates::Provider).string_len(50).not_null())
                    .col(ColumnDef::new(ExchangeRates::FetchStatus).string_len(20).not_null())
                    .col(
                        ColumnDef::new(ExchangeRates::FetchErrors)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(ExchangeRates::MissingCurrencies)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(ExchangeRates::FetchedAt)
                            .timestamp()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Upsert target: one snapshot per base and date
        manager
            .create_index(
                Index::create()
                    .name("idx_exchange_rates_base_date")
                    .table(ExchangeRates::Table)
                    .col(ExchangeRates::Base)
                    .col(ExchangeRates::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let seed = Query::insert()
            .into_table(Currencies::Table)
            .columns([
                Currencies::Code,
                Currencies::Decimals,
                Currencies::Symbol,
                Currencies::SymbolPosition,
                Currencies::RoundingStrategy,
            ])
            .values_panic(["USD".into(), 2.into(), "$".into(), "before".into(), "NONE".into()])
            .values_panic(["EUR".into(), 2.into(), "€".into(), "after".into(), "ENDING_9".into()])
            .values_panic(["GBP".into(), 2.into(), "£".into(), "before".into(), "ENDING_9".into()])
            .values_panic(["JPY".into(), 0.into(), "¥".into(), "before".into(), "NEAREST_10".into()])
            .on_conflict(OnConflict::column(Currencies::Code).do_nothing().to_owned())
            .to_owned();
        manager.exec_stmt(seed).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Currencies::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Currencies {
    Table,
    Code,
    Decimals,
    Symbol,
    SymbolPosition,
    RoundingStrategy,
    CustomRoundingRules,
    MarketMarkupAdjustmentPct,
    AllowManualRate,
    ManualRate,
    IsActive,
}

#[derive(DeriveIden)]
enum ExchangeRates {
    Table,
    Id,
    Base,
    Date,
    Rates,
    Provider,
    FetchStatus,
    FetchErrors,
    MissingCurrencies,
    FetchedAt,
}
