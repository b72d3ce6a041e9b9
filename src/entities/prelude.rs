//! `SeaORM` entity prelude

pub use super::currencies::Entity as Currencies;
pub use super::exchange_rates::Entity as ExchangeRates;
pub use super::product_variants::Entity as ProductVariants;
pub use super::products::Entity as Products;
pub use super::sync_status::Entity as SyncStatus;
