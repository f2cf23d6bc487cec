//! Postgres test databases.
//!
//! A single container is started per test binary and reused. Every
//! [`TestDb`] is a freshly migrated database of its own inside it, so tests
//! commit normally and never see each other's rows. Setting
//! `TEST_DATABASE_URL` to a server's admin database skips the container.

use std::sync::atomic::{AtomicUsize, Ordering};

use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use rand::{SeedableRng, rngs::StdRng};
use rescue_orderservice::{
    platform::db,
    store::{PgStore, postgres::DbPool},
};
use testcontainers::{ContainerAsync, core::IntoContainerPort, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use testresult::TestResult;
use tokio::sync::OnceCell;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

struct Server {
    _container: Option<ContainerAsync<Postgres>>,
    base_url: String,
}

impl Server {
    fn url(&self, database: &str) -> String {
        format!("{}/{database}", self.base_url)
    }
}

static SERVER: OnceCell<Server> = OnceCell::const_new();
static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

async fn start_server() -> TestResult<Server> {
    if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
        let base_url = url
            .rsplit_once('/')
            .map(|(base, _)| base.to_owned())
            .ok_or("TEST_DATABASE_URL must end with a database name")?;
        return Ok(Server {
            _container: None,
            base_url,
        });
    }

    let container = Postgres::default()
        .with_user("rescue_test")
        .with_password("rescue_test_password")
        .with_db_name("rescue_test")
        .start()
        .await?;
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432.tcp()).await?;

    Ok(Server {
        base_url: format!("postgresql://rescue_test:rescue_test_password@{host}:{port}"),
        _container: Some(container),
    })
}

pub struct TestDb {
    pub url: String,
    pub pool: DbPool,
}

impl TestDb {
    pub async fn new() -> TestResult<Self> {
        let server = SERVER.get_or_try_init(start_server).await?;
        let name = format!(
            "rescue_test_{}_{}",
            std::process::id(),
            NEXT_DB.fetch_add(1, Ordering::Relaxed)
        );

        let mut admin = AsyncPgConnection::establish(&server.url("postgres")).await?;
        diesel::sql_query(format!("CREATE DATABASE \"{name}\""))
            .execute(&mut admin)
            .await?;

        let url = server.url(&name);
        db::run_migrations_blocking(MIGRATIONS, &url).await?;
        let pool = db::build_pool(&url, 8).await?;

        Ok(Self { url, pool })
    }

    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }

    /// A store whose confirmation codes follow `seed`.
    pub fn seeded_store(&self, seed: u64) -> PgStore {
        PgStore::with_code_rng(self.pool.clone(), StdRng::seed_from_u64(seed))
    }
}
