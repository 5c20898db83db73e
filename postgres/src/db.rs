use config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::debug;

/// Connects to the configured database with a small pool.
///
/// Schema swaps run inside a single transaction, so a couple of connections are
/// enough for the swap itself plus concurrent status queries.
pub async fn connect_to_database(
    config: &PgConnectionConfig,
    min_connections: u32,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    let options = config.with_db();

    let pool = PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    debug!(
        host = %config.host,
        database = %config.name,
        "connected to postgres"
    );

    Ok(pool)
}

/// Builds a pool that only opens connections on first use.
pub fn lazy_database_pool(config: &PgConnectionConfig, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_lazy_with(config.with_db())
}
