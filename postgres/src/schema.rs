use std::fmt;

use pg_escape::quote_identifier;
use sqlx::{PgExecutor, Row};

/// Maximum length in bytes of a Postgres identifier (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Kind of schema-bound object moved by a schema swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaObjectKind {
    Table,
    View,
    EnumType,
}

impl SchemaObjectKind {
    /// Order in which objects are moved.
    pub const SWAP_ORDER: [SchemaObjectKind; 3] = [
        SchemaObjectKind::Table,
        SchemaObjectKind::View,
        SchemaObjectKind::EnumType,
    ];

    /// SQL keyword naming the object class in DDL.
    pub fn keyword(&self) -> &'static str {
        match self {
            SchemaObjectKind::Table => "table",
            SchemaObjectKind::View => "view",
            SchemaObjectKind::EnumType => "type",
        }
    }
}

impl fmt::Display for SchemaObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaObjectKind::Table => f.write_str("table"),
            SchemaObjectKind::View => f.write_str("view"),
            SchemaObjectKind::EnumType => f.write_str("enum type"),
        }
    }
}

/// Returns `true` when `name` is a plain, unquoted Postgres identifier.
///
/// Schema names are restricted to this form even though every statement quotes them.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    name.len() <= MAX_IDENTIFIER_LENGTH
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Builds `create schema if not exists`.
pub fn create_schema_statement(schema: &str) -> String {
    format!("create schema if not exists {}", quote_identifier(schema))
}

/// Builds the statement dropping a same-named object in `schema`, cascading to dependents.
pub fn drop_object_statement(kind: SchemaObjectKind, schema: &str, name: &str) -> String {
    format!(
        "drop {} if exists {}.{} cascade",
        kind.keyword(),
        quote_identifier(schema),
        quote_identifier(name)
    )
}

/// Builds the statement moving `source.name` into `destination`.
pub fn set_schema_statement(
    kind: SchemaObjectKind,
    source: &str,
    name: &str,
    destination: &str,
) -> String {
    format!(
        "alter {} {}.{} set schema {}",
        kind.keyword(),
        quote_identifier(source),
        quote_identifier(name),
        quote_identifier(destination)
    )
}

/// Lists the names of objects of `kind` in `schema` owned by `owner`, sorted by name.
pub async fn list_owned_objects<'c, E>(
    executor: E,
    kind: SchemaObjectKind,
    schema: &str,
    owner: &str,
) -> Result<Vec<String>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let query = match kind {
        SchemaObjectKind::Table => {
            r#"
            select tablename::text as name
            from pg_catalog.pg_tables
            where schemaname = $1 and tableowner = $2
            order by tablename
            "#
        }
        SchemaObjectKind::View => {
            r#"
            select viewname::text as name
            from pg_catalog.pg_views
            where schemaname = $1 and viewowner = $2
            order by viewname
            "#
        }
        SchemaObjectKind::EnumType => {
            r#"
            select t.typname::text as name
            from pg_catalog.pg_type t
            join pg_catalog.pg_namespace n on n.oid = t.typnamespace
            where t.typcategory = 'E'
              and n.nspname = $1
              and pg_catalog.pg_get_userbyid(t.typowner) = $2
            order by t.typname
            "#
        }
    };

    let rows = sqlx::query(query)
        .bind(schema)
        .bind(owner)
        .fetch_all(executor)
        .await?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect()
}

/// Counts the tables in `schema`, regardless of owner.
pub async fn count_tables<'c, E>(executor: E, schema: &str) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        select count(*) as table_count
        from pg_catalog.pg_tables
        where schemaname = $1
        "#,
    )
    .bind(schema)
    .fetch_one(executor)
    .await?;

    row.try_get("table_count")
}
