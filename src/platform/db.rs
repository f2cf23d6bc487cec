use anyhow::{Context, Result, anyhow};
use diesel::{Connection, PgConnection};
use diesel_async::{AsyncPgConnection, pooled_connection::AsyncDieselConnectionManager};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};

use crate::store::postgres::DbPool;

pub async fn build_pool(url: &str, max_size: u32) -> Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);

    DbPool::builder()
        .max_size(max_size)
        .build(manager)
        .await
        .context("Failed to build the DB connection pool")
}

/// Applies pending migrations over a short-lived synchronous connection.
///
/// Returns how many migrations were applied.
pub async fn run_migrations_blocking(migrations: EmbeddedMigrations, url: &str) -> Result<usize> {
    let url = url.to_owned();

    tokio::task::spawn_blocking(move || {
        let mut conn =
            PgConnection::establish(&url).context("Failed to connect to the database")?;
        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow!(err))
            .context("Failed to run migrations")?;
        Ok::<_, anyhow::Error>(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
