pub mod scheduler;
pub mod price_recalculation;
pub mod exchange_rate_refresh;
