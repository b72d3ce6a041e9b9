//! Runtime configuration loaded from the environment (and `.env` via dotenvy).

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable names
pub mod vars {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const BIND_ADDR: &str = "BIND_ADDR";
    pub const FX_PROVIDER_URL: &str = "FX_PROVIDER_URL";
    pub const FX_PROVIDER_NAME: &str = "FX_PROVIDER_NAME";
    pub const FX_MAX_RETRIES: &str = "FX_MAX_RETRIES";
    pub const FX_RETRY_BASE_DELAY_MS: &str = "FX_RETRY_BASE_DELAY_MS";
    pub const PRICING_INTERVAL_SECS: &str = "PRICING_INTERVAL_SECS";
    pub const FX_REFRESH_INTERVAL_SECS: &str = "FX_REFRESH_INTERVAL_SECS";
    pub const CATALOG_PAGE_SIZE: &str = "CATALOG_PAGE_SIZE";
    pub const SCHEDULER_ENABLED: &str = "SCHEDULER_ENABLED";
}

/// Defaults used when a variable is unset or unparseable
pub mod defaults {
    pub const BIND_ADDR: &str = "0.0.0.0:3000";
    pub const FX_PROVIDER_URL: &str = "https://api.frankfurter.app";
    pub const FX_PROVIDER_NAME: &str = "frankfurter";
    pub const FX_MAX_RETRIES: u32 = 3;
    pub const FX_RETRY_BASE_DELAY_MS: u64 = 1000;
    pub const PRICING_INTERVAL_SECS: u64 = 3600; // hourly
    pub const FX_REFRESH_INTERVAL_SECS: u64 = 86400; // daily
    pub const CATALOG_PAGE_SIZE: u64 = 200;
    /// Lower bound for both job intervals
    pub const MIN_INTERVAL_SECS: u64 = 1;
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub fx_provider_url: String,
    pub fx_provider_name: String,
    pub fx_max_retries: u32,
    pub fx_retry_base_delay: Duration,
    pub pricing_interval: Duration,
    pub fx_refresh_interval: Duration,
    pub catalog_page_size: u64,
    pub scheduler_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: defaults::BIND_ADDR.to_string(),
            fx_provider_url: defaults::FX_PROVIDER_URL.to_string(),
            fx_provider_name: defaults::FX_PROVIDER_NAME.to_string(),
            fx_max_retries: defaults::FX_MAX_RETRIES,
            fx_retry_base_delay: Duration::from_millis(defaults::FX_RETRY_BASE_DELAY_MS),
            pricing_interval: Duration::from_secs(defaults::PRICING_INTERVAL_SECS),
            fx_refresh_interval: Duration::from_secs(defaults::FX_REFRESH_INTERVAL_SECS),
            catalog_page_size: defaults::CATALOG_PAGE_SIZE,
            scheduler_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read every setting from the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Used by `from_env` and tests.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            database_url: lookup(vars::DATABASE_URL).filter(|v| !v.trim().is_empty()),
            bind_addr: string_or(vars::BIND_ADDR, defaults::BIND_ADDR),
            fx_provider_url: string_or(vars::FX_PROVIDER_URL, defaults::FX_PROVIDER_URL),
            fx_provider_name: string_or(vars::FX_PROVIDER_NAME, defaults::FX_PROVIDER_NAME),
            fx_max_retries: parse_or(&lookup, vars::FX_MAX_RETRIES, defaults::FX_MAX_RETRIES),
            fx_retry_base_delay: Duration::from_millis(parse_or(
                &lookup,
                vars::FX_RETRY_BASE_DELAY_MS,
                defaults::FX_RETRY_BASE_DELAY_MS,
            )),
            pricing_interval: interval_or(
                &lookup,
                vars::PRICING_INTERVAL_SECS,
                defaults::PRICING_INTERVAL_SECS,
            ),
            fx_refresh_interval: interval_or(
                &lookup,
                vars::FX_REFRESH_INTERVAL_SECS,
                defaults::FX_REFRESH_INTERVAL_SECS,
            ),
            catalog_page_size: parse_or(&lookup, vars::CATALOG_PAGE_SIZE, defaults::CATALOG_PAGE_SIZE)
                .max(1),
            scheduler_enabled: lookup(vars::SCHEDULER_ENABLED)
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid value '{}' for {}, using default {}", raw, key, default);
                default
            }
        },
    }
}

fn interval_or<F>(lookup: &F, key: &str, default_secs: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_or(lookup, key, default_secs);
    if secs < defaults::MIN_INTERVAL_SECS {
        tracing::warn!(
            "{} must be at least {}s, got {}",
            key,
            defaults::MIN_INTERVAL_SECS,
            secs
        );
    }
    Duration::from_secs(secs.max(defaults::MIN_INTERVAL_SECS))
}
