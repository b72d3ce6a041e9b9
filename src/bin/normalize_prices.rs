use rust_decimal::Decimal;
use sea_orm::Database;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_pricing::config::AppConfig;
use marketplace_pricing::repository::postgres::PgCatalogRepository;
use marketplace_pricing::services::price_normalization::{DEFAULT_THRESHOLD, PriceNormalizer};

fn usage() -> ! {
    eprintln!("Usage: cargo run --bin normalize_prices -- [--apply] [--threshold <amount>]");
    eprintln!("Example: cargo run --bin normalize_prices -- --threshold 5000");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marketplace_pricing=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let mut apply = false;
    let mut threshold = DEFAULT_THRESHOLD;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--apply" => apply = true,
            "--threshold" => {
                let value = args.next().unwrap_or_else(|| usage());
                threshold = Decimal::from_str(&value).unwrap_or_else(|_| {
                    eprintln!("Invalid threshold '{}'. Must be a number.", value);
                    usage()
                });
            }
            _ => usage(),
        }
    }

    let database_url = config
        .database_url
        .clone()
        .ok_or("DATABASE_URL must be set")?;
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;

    let catalog = Arc::new(PgCatalogRepository::new(db));
    let normalizer = PriceNormalizer::new(catalog, threshold);

    tracing::info!(
        "Scanning for prices above {} ({})",
        threshold,
        if apply { "apply" } else { "dry run" }
    );

    let report = normalizer.run(apply).await?;

    for correction in &report.corrections {
        tracing::info!(
            "{:?} {}: base {} -> {}, final {} -> {}",
            correction.kind,
            correction.id,
            correction.before.base_price,
            correction.after.base_price,
            correction.before.final_price,
            correction.after.final_price
        );
    }
    for resync in &report.resyncs {
        tracing::info!(
            "Product {}: price {} -> {} (stock {})",
            resync.product_id,
            resync.old_price,
            resync.new_price,
            resync.total_stock
        );
    }

    if report.skipped_overrides > 0 {
        tracing::info!("Skipped {} items with a manual override", report.skipped_overrides);
    }

    if apply {
        tracing::info!("Applied {} updates, {} failed", report.applied, report.failed);
    } else {
        tracing::info!(
            "Dry run: {} corrections and {} re-syncs pending. Re-run with --apply to write them",
            report.corrections.len(),
            report.resyncs.len()
        );
    }

    Ok(())
}
