use backup_restore::error::ErrorKind;
use backup_restore::failpoints::SCHEMA_SWAP__AFTER_TABLES;
use backup_restore::schema::memory::MemorySchemaCatalog;
use backup_restore::schema::postgres::PgSchemaSwapper;
use backup_restore::schema::{BACKUP_SCHEMA, PUBLIC_SCHEMA, SchemaSwapper};
use backup_restore::test_utils::database::spawn_database;
use backup_restore::test_utils::failpoints::CustomFailScenario;
use postgres::schema::{SchemaObjectKind, list_owned_objects};
use telemetry::tracing::init_test_tracing;

#[tokio::test]
async fn memory_swap_failing_after_tables_moves_nothing() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(SCHEMA_SWAP__AFTER_TABLES, "return")]);

    let catalog = MemorySchemaCatalog::new("app");
    catalog
        .create_owned(SchemaObjectKind::Table, PUBLIC_SCHEMA, "posts")
        .await;
    catalog
        .create_owned(SchemaObjectKind::View, PUBLIC_SCHEMA, "recent_posts")
        .await;
    catalog
        .create_owned(SchemaObjectKind::EnumType, PUBLIC_SCHEMA, "mood")
        .await;

    let err = catalog.swap(PUBLIC_SCHEMA, BACKUP_SCHEMA).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailpointInjected);

    assert_eq!(
        catalog
            .object_names(SchemaObjectKind::Table, PUBLIC_SCHEMA)
            .await,
        vec!["posts"]
    );
    assert_eq!(
        catalog
            .object_names(SchemaObjectKind::View, PUBLIC_SCHEMA)
            .await,
        vec!["recent_posts"]
    );
    assert_eq!(
        catalog
            .object_names(SchemaObjectKind::EnumType, PUBLIC_SCHEMA)
            .await,
        vec!["mood"]
    );
    assert!(!catalog.schema_exists(BACKUP_SCHEMA).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn postgres_swap_failing_after_tables_is_rolled_back() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(SCHEMA_SWAP__AFTER_TABLES, "return")]);

    let database = spawn_database().await;
    for statement in [
        "create table public.posts (id bigint primary key)",
        "create view public.recent_posts as select id from public.posts",
        "create type public.mood as enum ('happy', 'sad')",
    ] {
        sqlx::query(statement)
            .execute(&database.pool)
            .await
            .unwrap();
    }
    let owner = database.config.username.clone();
    let swapper = PgSchemaSwapper::new(database.pool.clone(), owner.clone());

    let err = swapper.swap(PUBLIC_SCHEMA, BACKUP_SCHEMA).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailpointInjected);

    for (kind, name) in [
        (SchemaObjectKind::Table, "posts"),
        (SchemaObjectKind::View, "recent_posts"),
        (SchemaObjectKind::EnumType, "mood"),
    ] {
        assert_eq!(
            list_owned_objects(&database.pool, kind, PUBLIC_SCHEMA, &owner)
                .await
                .unwrap(),
            vec![name]
        );
    }

    let backup_exists: bool = sqlx::query_scalar(
        "select exists (select 1 from pg_catalog.pg_namespace where nspname = 'backup')",
    )
    .fetch_one(&database.pool)
    .await
    .unwrap();
    assert!(!backup_exists);
}
