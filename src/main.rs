use std::sync::Arc;

use anyhow::Result;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use rescue_orderservice::{
    platform::{
        app_state::AppState,
        bootstrap::{self, serve},
        config::Config,
        db,
    },
    service::MarketplaceSettings,
    store::{MarketplaceStore, MemoryStore, PgStore},
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    bootstrap::init_tracing(&config)?;

    let store: Arc<dyn MarketplaceStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Running migrations...");
            let migrations_count = db::run_migrations_blocking(MIGRATIONS, url).await?;
            tracing::info!("Run {} new migrations successfully", migrations_count);

            let pool = db::build_pool(url, config.database_pool_size).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, keeping data in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let settings = MarketplaceSettings::from(&config);
    tracing::info!(
        transitions = ?settings.transitions,
        cancellation = ?settings.cancellation,
        default_radius_km = settings.default_radius_km,
        "Bootstrapping..."
    );

    let app = bootstrap::app(AppState::new(store, settings));
    serve("OrderService", app, &config).await?;
    Ok(())
}
