use config::shared::{IntoConnectOptions, PgConnectionConfig};
use pg_escape::{quote_identifier, quote_literal};
use sqlx::{Connection, Executor, PgConnection, PgPool};

/// Creates the database named in `config` and returns a pool connected to it.
///
/// # Panics
/// Panics if the server cannot be reached or the database cannot be created.
pub async fn create_pg_database(config: &PgConnectionConfig) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(
            "create database {};",
            quote_identifier(&config.name)
        ))
        .await
        .expect("Failed to create database");

    PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres")
}

/// Terminates every session on the database named in `config` and drops it.
///
/// Never panics: cleanup problems are printed and ignored so that a failed test
/// reports its own failure rather than a teardown error.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let mut connection = match PgConnection::connect_with(&config.without_db()).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {e}");
            return;
        }
    };

    if let Err(e) = connection
        .execute(&*format!(
            r#"
            select pg_terminate_backend(pg_stat_activity.pid)
            from pg_stat_activity
            where pg_stat_activity.datname = {}
            and pid <> pg_backend_pid();"#,
            quote_literal(&config.name)
        ))
        .await
    {
        eprintln!(
            "warning: failed to terminate connections for database {}: {}",
            config.name, e
        );
    }

    if let Err(e) = connection
        .execute(&*format!(
            "drop database if exists {};",
            quote_identifier(&config.name)
        ))
        .await
    {
        eprintln!("warning: failed to drop database {}: {}", config.name, e);
    }
}

/// Creates a role that can own application objects, ignoring an existing one.
///
/// Roles are shared by every database of the server, so concurrent tests may race to
/// create the same role.
pub async fn ensure_role(pool: &PgPool, role: &str) -> Result<(), sqlx::Error> {
    let exists: bool =
        sqlx::query_scalar("select exists (select 1 from pg_catalog.pg_roles where rolname = $1)")
            .bind(role)
            .fetch_one(pool)
            .await?;

    if exists {
        return Ok(());
    }

    match pool
        .execute(&*format!("create role {} nologin", quote_identifier(role)))
        .await
    {
        Ok(_) => Ok(()),
        // duplicate_object, or unique_violation when the race happens inside the catalog.
        Err(sqlx::Error::Database(err))
            if matches!(err.code().as_deref(), Some("42710") | Some("23505")) =>
        {
            Ok(())
        }
        Err(err) => Err(err),
    }
}
