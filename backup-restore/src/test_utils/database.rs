use config::shared::{PgConnectionConfig, TlsConfig};
use postgres::test_utils::{create_pg_database, drop_pg_database};
use sqlx::PgPool;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Builds the connection config of a uniquely named database on the test server.
///
/// Reads `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME` and the
/// optional `TESTS_DATABASE_PASSWORD`.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig {
            trusted_root_certs: String::new(),
            enabled: false,
        },
    }
}

/// Database created for one test and dropped with it.
///
/// Dropping requires a multi-threaded runtime.
pub struct TestDatabase {
    pub config: PgConnectionConfig,
    pub pool: PgPool,
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tokio::task::block_in_place(|| {
                Handle::current().block_on(async {
                    self.pool.close().await;
                    drop_pg_database(&self.config).await;
                });
            });
        }));
    }
}

pub async fn spawn_database() -> TestDatabase {
    let config = local_pg_connection_config();
    let pool = create_pg_database(&config).await;

    TestDatabase { config, pool }
}
