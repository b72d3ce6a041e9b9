//! Error types shared by the I/O-bound parts of the service.
//!
//! Pure pricing code never returns these; it clamps or defaults instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PricingError {
    /// Missing or unusable currency configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rate provider could not be reached after every retry.
    #[error("Rate provider unavailable after {attempts} attempts: {last_error}")]
    ProviderUnavailable { attempts: u32, last_error: String },

    #[error("No exchange rate available for {0}")]
    RateUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for PricingError {
    fn from(value: String) -> Self {
        PricingError::Other(value)
    }
}

impl From<&str> for PricingError {
    fn from(value: &str) -> Self {
        PricingError::Other(value.to_string())
    }
}

pub type PricingResult<T> = Result<T, PricingError>;
