use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_pricing::{
    config::AppConfig,
    handlers,
    jobs::{
        exchange_rate_refresh::ExchangeRateRefreshJob, price_recalculation::PriceRecalculationJob,
        scheduler::Scheduler,
    },
    repository::{
        memory::{MemoryCatalogRepository, MemoryJobStatusRepository, MemoryRateRepository},
        postgres::{PgCatalogRepository, PgJobStatusRepository, PgRateRepository},
        CatalogRepository, JobStatusRepository, RateRepository,
    },
    services::{
        demand_tracker::DemandTracker,
        rate_fetcher::{HttpRateProvider, RateFetcher},
        rate_store::RateStore,
    },
    AppState,
};

type Repositories = (
    Arc<dyn CatalogRepository>,
    Arc<dyn RateRepository>,
    Arc<dyn JobStatusRepository>,
);

async fn connect_repositories(
    config: &AppConfig,
) -> Result<Repositories, Box<dyn std::error::Error + Send + Sync>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory storage (data is lost on exit)");
        return Ok((
            Arc::new(MemoryCatalogRepository::new()),
            Arc::new(MemoryRateRepository::new()),
            Arc::new(MemoryJobStatusRepository::new()),
        ));
    };

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    Ok((
        Arc::new(PgCatalogRepository::new(db.clone())),
        Arc::new(PgRateRepository::new(db.clone())),
        Arc::new(PgJobStatusRepository::new(db)),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marketplace_pricing=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    let config = AppConfig::from_env();

    let (catalog, rates, job_status) = connect_repositories(&config).await?;

    let rate_store = RateStore::new(rates);
    let provider = HttpRateProvider::new(config.fx_provider_url.clone(), config.fx_provider_name.clone());
    let fetcher = RateFetcher::new(Arc::new(provider))
        .with_retry(config.fx_max_retries, config.fx_retry_base_delay);
    let demand = Arc::new(DemandTracker::new());

    let scheduler = Arc::new(
        Scheduler::new(job_status)
            .register(Arc::new(PriceRecalculationJob::new(
                catalog.clone(),
                demand.clone(),
                config.catalog_page_size,
                config.pricing_interval,
            )))
            .register(Arc::new(ExchangeRateRefreshJob::new(
                rate_store.clone(),
                fetcher.clone(),
                config.fx_refresh_interval,
            ))),
    );

    if config.scheduler_enabled {
        scheduler.start();
    } else {
        tracing::info!("Scheduler disabled, jobs run only on manual trigger");
    }

    let state = AppState {
        rate_store,
        fetcher,
        catalog,
        demand,
        scheduler: scheduler.clone(),
    };

    let app = handlers::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    scheduler.stop().await;

    Ok(())
}
