use backup_restore::coordinator::OperationCoordinator;
use backup_restore::error::ErrorKind;
use backup_restore::jobs::memory::MemoryJobRegistry;
use backup_restore::logs::memory::MemoryLogChannel;
use backup_restore::schema::postgres::PgSchemaSwapper;
use backup_restore::schema::{BACKUP_SCHEMA, PUBLIC_SCHEMA, SchemaSwapper};
use backup_restore::store::memory::MemoryStore;
use backup_restore::test_utils::coordinator::test_settings;
use backup_restore::test_utils::database::{TestDatabase, spawn_database};
use backup_restore::types::TenantId;
use postgres::schema::{SchemaObjectKind, list_owned_objects};
use postgres::test_utils::ensure_role;
use sqlx::PgPool;
use telemetry::tracing::init_test_tracing;

const OTHER_OWNER: &str = "br_extension_owner";

async fn execute(pool: &PgPool, statement: &str) {
    sqlx::query(statement)
        .execute(pool)
        .await
        .unwrap_or_else(|err| panic!("failed to execute `{statement}`: {err}"));
}

/// Creates two tables, a view and an enum type owned by the test user, plus a table
/// owned by another role.
async fn setup_public_schema(database: &TestDatabase) {
    let pool = &database.pool;
    execute(pool, "create table public.posts (id bigint primary key, raw text)").await;
    execute(pool, "create table public.users (id bigint primary key)").await;
    execute(
        pool,
        "create view public.recent_posts as select id from public.posts order by id desc",
    )
    .await;
    execute(pool, "create type public.mood as enum ('happy', 'sad')").await;

    ensure_role(pool, OTHER_OWNER).await.unwrap();
    execute(pool, "create table public.spatial_ref_sys (srid int)").await;
    execute(
        pool,
        &format!("alter table public.spatial_ref_sys owner to {OTHER_OWNER}"),
    )
    .await;
}

async fn objects(
    database: &TestDatabase,
    kind: SchemaObjectKind,
    schema: &str,
    owner: &str,
) -> Vec<String> {
    list_owned_objects(&database.pool, kind, schema, owner)
        .await
        .unwrap()
}

fn swapper(database: &TestDatabase) -> PgSchemaSwapper {
    PgSchemaSwapper::new(database.pool.clone(), database.config.username.clone())
}

#[tokio::test(flavor = "multi_thread")]
async fn swap_moves_owned_objects_to_backup_schema() {
    init_test_tracing();

    let database = spawn_database().await;
    setup_public_schema(&database).await;
    let owner = database.config.username.clone();
    let swapper = swapper(&database);

    swapper.swap(PUBLIC_SCHEMA, BACKUP_SCHEMA).await.unwrap();

    assert_eq!(
        objects(&database, SchemaObjectKind::Table, BACKUP_SCHEMA, &owner).await,
        vec!["posts", "users"]
    );
    assert_eq!(
        objects(&database, SchemaObjectKind::View, BACKUP_SCHEMA, &owner).await,
        vec!["recent_posts"]
    );
    assert_eq!(
        objects(&database, SchemaObjectKind::EnumType, BACKUP_SCHEMA, &owner).await,
        vec!["mood"]
    );
    assert_eq!(
        objects(&database, SchemaObjectKind::Table, PUBLIC_SCHEMA, OTHER_OWNER).await,
        vec!["spatial_ref_sys"]
    );
    assert_eq!(swapper.count_tables(PUBLIC_SCHEMA).await.unwrap(), 1);
    assert_eq!(swapper.count_tables(BACKUP_SCHEMA).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn swap_replaces_the_previous_snapshot() {
    init_test_tracing();

    let database = spawn_database().await;
    setup_public_schema(&database).await;
    execute(&database.pool, "create schema backup").await;
    execute(&database.pool, "create table backup.posts (legacy int)").await;
    execute(&database.pool, "create table backup.old_only (id int)").await;

    swapper(&database)
        .swap(PUBLIC_SCHEMA, BACKUP_SCHEMA)
        .await
        .unwrap();

    let columns: Vec<String> = sqlx::query_scalar(
        "select column_name::text from information_schema.columns \
         where table_schema = 'backup' and table_name = 'posts' order by ordinal_position",
    )
    .fetch_all(&database.pool)
    .await
    .unwrap();
    assert_eq!(columns, vec!["id", "raw"]);

    // Objects without a same-named replacement are left in place.
    let owner = database.config.username.clone();
    assert_eq!(
        objects(&database, SchemaObjectKind::Table, BACKUP_SCHEMA, &owner).await,
        vec!["old_only", "posts", "users"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_schema_names_are_rejected() {
    let database = spawn_database().await;
    let swapper = swapper(&database);

    let err = swapper
        .swap(PUBLIC_SCHEMA, "backup; drop schema public")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);

    let err = swapper.count_tables("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
}

#[tokio::test(flavor = "multi_thread")]
async fn rollback_moves_snapshot_back_to_public() {
    init_test_tracing();

    let database = spawn_database().await;
    setup_public_schema(&database).await;
    let coordinator = OperationCoordinator::new(
        TenantId::new("default").unwrap(),
        MemoryStore::new(),
        MemoryLogChannel::new(),
        MemoryJobRegistry::new(),
        swapper(&database),
        test_settings(),
    );

    assert!(!coordinator.status().await.unwrap().can_rollback);

    swapper(&database)
        .swap(PUBLIC_SCHEMA, BACKUP_SCHEMA)
        .await
        .unwrap();
    // A restore would now recreate the public tables; an empty one is enough here.
    execute(&database.pool, "create table public.posts (id bigint)").await;
    assert!(coordinator.status().await.unwrap().can_rollback);

    assert!(coordinator.rollback().await.unwrap());

    let owner = database.config.username.clone();
    assert_eq!(
        objects(&database, SchemaObjectKind::Table, PUBLIC_SCHEMA, &owner).await,
        vec!["posts", "users"]
    );
    let columns: i64 = sqlx::query_scalar(
        "select count(*) from information_schema.columns \
         where table_schema = 'public' and table_name = 'posts'",
    )
    .fetch_one(&database.pool)
    .await
    .unwrap();
    assert_eq!(columns, 2);
    assert!(!coordinator.status().await.unwrap().can_rollback);
}
