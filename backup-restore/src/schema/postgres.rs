use ::postgres::schema::{
    SchemaObjectKind, count_tables, create_schema_statement, drop_object_statement,
    list_owned_objects, set_schema_statement,
};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::br_error;
use crate::error::{BrError, BrResult, ErrorKind};
#[cfg(feature = "failpoints")]
use crate::failpoints::{SCHEMA_SWAP__AFTER_TABLES, br_fail_point};
use crate::schema::base::{SchemaSwapper, validate_schema_name, validate_swap};

/// [`SchemaSwapper`] issuing DDL against Postgres inside one transaction.
#[derive(Debug, Clone)]
pub struct PgSchemaSwapper {
    pool: PgPool,
    owner: String,
}

impl PgSchemaSwapper {
    /// Creates a swapper moving the objects owned by the role `owner`.
    pub fn new(pool: PgPool, owner: impl Into<String>) -> Self {
        Self {
            pool,
            owner: owner.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SchemaSwapper for PgSchemaSwapper {
    async fn swap(&self, source: &str, destination: &str) -> BrResult<()> {
        validate_swap(source, destination)?;

        // Dropping the transaction on any early return rolls every statement back.
        let mut tx = self.pool.begin().await.map_err(swap_error)?;

        sqlx::query(&create_schema_statement(destination))
            .execute(&mut *tx)
            .await
            .map_err(swap_error)?;

        for kind in SchemaObjectKind::SWAP_ORDER {
            let names = list_owned_objects(&mut *tx, kind, source, &self.owner)
                .await
                .map_err(swap_error)?;

            for name in &names {
                sqlx::query(&drop_object_statement(kind, destination, name))
                    .execute(&mut *tx)
                    .await
                    .map_err(swap_error)?;
                sqlx::query(&set_schema_statement(kind, source, name, destination))
                    .execute(&mut *tx)
                    .await
                    .map_err(swap_error)?;
            }

            debug!(%kind, moved = names.len(), source, destination, "moved schema objects");

            #[cfg(feature = "failpoints")]
            if kind == SchemaObjectKind::Table {
                br_fail_point(SCHEMA_SWAP__AFTER_TABLES)?;
            }
        }

        tx.commit().await.map_err(swap_error)?;
        info!(source, destination, owner = %self.owner, "schema swap committed");

        Ok(())
    }

    async fn count_tables(&self, schema: &str) -> BrResult<u64> {
        validate_schema_name(schema)?;

        let count = count_tables(&self.pool, schema).await?;

        Ok(count.max(0) as u64)
    }
}

fn swap_error(err: sqlx::Error) -> BrError {
    br_error!(
        ErrorKind::SchemaSwapFailed,
        "Moving objects between schemas failed",
        err.to_string(),
        source: err
    )
}
