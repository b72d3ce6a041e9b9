pub mod common;
pub mod exchange_rates;
pub mod prices;
pub mod demand;
pub mod jobs;
