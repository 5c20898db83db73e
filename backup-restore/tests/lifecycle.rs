#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backup_restore::bail;
use backup_restore::coordinator::CoordinatorSettings;
use backup_restore::error::{BrResult, ErrorKind};
use backup_restore::jobs::{JobRegistry, JobSet};
use backup_restore::logs::LogLevel;
use backup_restore::schema::{BACKUP_SCHEMA, PUBLIC_SCHEMA, SchemaSwapper};
use backup_restore::store::CoordinationStore;
use backup_restore::test_utils::coordinator::{MemoryBackends, test_settings};
use backup_restore::test_utils::jobs::{tenant_job, untagged_job};
use backup_restore::types::OperationKind;
use config::Environment;
use futures::future::join_all;
use postgres::schema::SchemaObjectKind;
use telemetry::tracing::init_test_tracing;
use tokio::time::{sleep, timeout};

async fn failing_restore() -> BrResult<()> {
    bail!(ErrorKind::DatabaseQueryFailed, "Dump could not be restored");
}

async fn crashing_backup() -> BrResult<()> {
    panic!("dump process crashed");
}

async fn backends_with_public_tables() -> MemoryBackends {
    let backends = MemoryBackends::new();
    for table in ["posts", "users"] {
        backends
            .catalog
            .create_owned(SchemaObjectKind::Table, PUBLIC_SCHEMA, table)
            .await;
    }

    backends
}

#[tokio::test]
async fn concurrent_starts_have_a_single_winner() {
    init_test_tracing();

    let backends = MemoryBackends::new();
    let coordinators: Vec<_> = (0..8).map(|_| backends.coordinator("default")).collect();

    let results = join_all(
        coordinators
            .iter()
            .map(|coordinator| coordinator.start(OperationKind::Backup)),
    )
    .await;

    let mut handles = Vec::new();
    let mut rejected = 0;
    for result in results {
        match result {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::OperationAlreadyRunning);
                rejected += 1;
            }
        }
    }
    assert_eq!(handles.len(), 1);
    assert_eq!(rejected, 7);

    let other_tenant = backends.coordinator("second");
    let handle = other_tenant.start(OperationKind::Restore).await.unwrap();
    other_tenant.finish(handle).await.unwrap();

    for handle in handles {
        coordinators[0].finish(handle).await.unwrap();
    }
    assert!(!coordinators[0].is_operation_running().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn backup_run_restores_system_state() {
    init_test_tracing();

    let backends = backends_with_public_tables().await;
    let coordinator = backends.coordinator("default");

    coordinator
        .run(OperationKind::Backup, |context| async move {
            assert!(context.checkpoint().await.is_ok());
            context.snapshot_public_schema().await
        })
        .await
        .unwrap();

    let coordination = coordinator.coordination();
    assert!(!coordination.is_running().await.unwrap());
    assert!(!coordination.is_readonly().await.unwrap());
    assert!(!coordination.is_paused().await.unwrap());

    let status = coordinator.status().await.unwrap();
    assert!(!status.is_operation_running);
    assert!(status.can_rollback);
    assert!(!status.allow_restore);

    let messages = backends.channel.messages().await;
    assert_eq!(messages.first().map(String::as_str), Some("[STARTED] backup"));
    assert!(messages.iter().any(|message| message == "[SUCCESS] backup"));
    assert_eq!(
        messages.last().map(String::as_str),
        Some("Marking operation as finished...")
    );
}

#[tokio::test(start_paused = true)]
async fn failed_work_still_releases_everything() {
    init_test_tracing();

    let backends = MemoryBackends::new();
    let coordinator = backends.coordinator("default");
    coordinator.modes().enable_readonly().await.unwrap();

    let err = coordinator
        .run(OperationKind::Restore, |_context| failing_restore())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DatabaseQueryFailed);
    let coordination = coordinator.coordination();
    assert!(!coordination.is_running().await.unwrap());
    // Read-only mode was on before the run and stays on.
    assert!(coordination.is_readonly().await.unwrap());
    assert!(!coordination.is_paused().await.unwrap());

    let entries = backends.channel.entries().await;
    let failed = entries
        .iter()
        .find(|entry| entry.message == "[FAILED] restore")
        .unwrap();
    assert_eq!(failed.level, LogLevel::Error);
    assert_eq!(failed.error.as_deref(), Some("Dump could not be restored"));
}

#[tokio::test(start_paused = true)]
async fn panicking_work_is_reported_as_error() {
    init_test_tracing();

    let backends = MemoryBackends::new();
    let coordinator = backends.coordinator("default");

    let err = coordinator
        .run(OperationKind::Backup, |_context| crashing_backup())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::OperationPanicked);
    assert_eq!(err.detail(), Some("dump process crashed"));
    assert!(!coordinator.is_operation_running().await.unwrap());
    assert!(!coordinator.coordination().is_paused().await.unwrap());

    // The tenant can run again.
    coordinator
        .run(OperationKind::Backup, |_context| async move { Ok(()) })
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_drain_aborts_before_work() {
    init_test_tracing();

    let backends = backends_with_public_tables().await;
    let coordinator = backends.coordinator("default");
    let canceller = backends.coordinator("default");
    let work_ran = Arc::new(AtomicBool::new(false));

    let work_flag = work_ran.clone();
    let (result, cancelled) = tokio::join!(
        coordinator.run(OperationKind::Restore, |context| async move {
            work_flag.store(true, Ordering::SeqCst);
            context.snapshot_public_schema().await
        }),
        async {
            sleep(Duration::from_secs(1)).await;
            canceller.request_cancellation().await
        }
    );

    cancelled.unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::OperationCancelled);
    assert!(!work_ran.load(Ordering::SeqCst));
    assert_eq!(backends.catalog.count_tables(PUBLIC_SCHEMA).await.unwrap(), 2);
    assert_eq!(backends.catalog.count_tables(BACKUP_SCHEMA).await.unwrap(), 0);

    assert!(!coordinator.is_operation_running().await.unwrap());
    assert!(!coordinator.coordination().is_readonly().await.unwrap());
    assert!(
        backends
            .channel
            .messages()
            .await
            .contains(&"[CANCELLED] restore".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn dropped_run_releases_the_tenant() {
    init_test_tracing();

    let backends = MemoryBackends::new();
    let coordinator = backends.coordinator("default");
    let work_ran = Arc::new(AtomicBool::new(false));

    // The drain sleeps one poll interval first, so the run is dropped while draining.
    let work_flag = work_ran.clone();
    let outcome = timeout(
        Duration::from_secs(3),
        coordinator.run(OperationKind::Backup, |_context| async move {
            work_flag.store(true, Ordering::SeqCst);
            Ok(())
        }),
    )
    .await;
    assert!(outcome.is_err());

    // Lets the spawned cleanup run.
    sleep(Duration::from_secs(1)).await;

    let coordination = coordinator.coordination();
    assert!(!work_ran.load(Ordering::SeqCst));
    assert!(!coordination.is_running().await.unwrap());
    assert!(!coordination.is_readonly().await.unwrap());
    assert!(!coordination.is_paused().await.unwrap());
    assert!(
        backends
            .channel
            .messages()
            .await
            .contains(&"[ABORTED] backup".to_string())
    );

    coordinator
        .run(OperationKind::Backup, |_context| async move { Ok(()) })
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn dropped_run_keeps_modes_that_were_already_on() {
    init_test_tracing();

    let backends = MemoryBackends::new();
    let coordinator = backends.coordinator("default");
    coordinator.modes().enable_readonly().await.unwrap();

    let outcome = timeout(
        Duration::from_secs(3),
        coordinator.run(OperationKind::Restore, |_context| async move { Ok(()) }),
    )
    .await;
    assert!(outcome.is_err());
    sleep(Duration::from_secs(1)).await;

    let coordination = coordinator.coordination();
    assert!(!coordination.is_running().await.unwrap());
    assert!(coordination.is_readonly().await.unwrap());
    assert!(!coordination.is_paused().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn restore_purges_tenant_jobs_and_keys() {
    init_test_tracing();

    let backends = MemoryBackends::new();
    let coordinator = backends.coordinator("default");
    let queue = JobSet::Queue("default".to_string());
    backends
        .registry
        .push(queue.clone(), tenant_job("default", "default"))
        .await;
    backends
        .registry
        .push(queue.clone(), tenant_job("default", "second"))
        .await;
    backends
        .registry
        .push(JobSet::Retry, untagged_job("low"))
        .await;
    backends.store.set("default:cache:posts", "[]").await.unwrap();
    backends.store.set("second:cache:posts", "[]").await.unwrap();

    coordinator
        .run(OperationKind::Restore, |_context| async move { Ok(()) })
        .await
        .unwrap();

    let remaining = backends.registry.jobs(&queue).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].tenant_tag(), Some("second"));
    assert_eq!(backends.registry.jobs(&JobSet::Retry).await.unwrap().len(), 1);

    assert_eq!(backends.store.get("default:cache:posts").await.unwrap(), None);
    assert!(backends.store.get("second:cache:posts").await.unwrap().is_some());
    // The log cursor survives the flush so the dashboard can still replay the run.
    assert!(
        coordinator
            .logs()
            .await
            .unwrap()
            .iter()
            .any(|entry| entry.message == "[SUCCESS] restore")
    );
}

#[tokio::test(start_paused = true)]
async fn backup_leaves_pending_jobs_alone() {
    let backends = MemoryBackends::new();
    let coordinator = backends.coordinator("default");
    let queue = JobSet::Queue("default".to_string());
    backends
        .registry
        .push(queue.clone(), tenant_job("default", "default"))
        .await;
    backends.store.set("default:cache:posts", "[]").await.unwrap();

    coordinator
        .run(OperationKind::Backup, |_context| async move { Ok(()) })
        .await
        .unwrap();

    assert_eq!(backends.registry.jobs(&queue).await.unwrap().len(), 1);
    assert!(backends.store.get("default:cache:posts").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn rollback_requires_a_snapshot_and_no_running_operation() {
    init_test_tracing();

    let backends = backends_with_public_tables().await;
    let coordinator = backends.coordinator("default");

    assert!(!coordinator.can_rollback().await.unwrap());
    assert!(!coordinator.rollback().await.unwrap());

    coordinator
        .run(OperationKind::Restore, |context| async move {
            context.snapshot_public_schema().await
        })
        .await
        .unwrap();
    assert!(coordinator.can_rollback().await.unwrap());

    let handle = coordinator.start(OperationKind::Backup).await.unwrap();
    let err = coordinator.rollback().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OperationAlreadyRunning);
    coordinator.finish(handle).await.unwrap();

    assert!(coordinator.rollback().await.unwrap());
    assert!(!coordinator.status().await.unwrap().can_rollback);
    assert_eq!(backends.catalog.count_tables(PUBLIC_SCHEMA).await.unwrap(), 2);
}

#[tokio::test]
async fn restore_policy_in_status() {
    let backends = MemoryBackends::new();

    let production = backends.coordinator("default");
    assert!(!production.status().await.unwrap().allow_restore);

    let allowed = backends.coordinator_with(
        "default",
        CoordinatorSettings {
            allow_restore: true,
            ..test_settings()
        },
    );
    assert!(allowed.status().await.unwrap().allow_restore);

    let development = backends.coordinator_with(
        "default",
        CoordinatorSettings {
            environment: Environment::Dev,
            ..test_settings()
        },
    );
    assert!(development.status().await.unwrap().allow_restore);
}

#[tokio::test(start_paused = true)]
async fn logs_replay_only_the_latest_operation() {
    let backends = MemoryBackends::new();
    let coordinator = backends.coordinator("default");

    coordinator
        .run(OperationKind::Backup, |context| async move {
            context.logger().log("first dump").await;
            Ok(())
        })
        .await
        .unwrap();
    coordinator
        .run(OperationKind::Backup, |context| async move {
            context.logger().log("second dump").await;
            Ok(())
        })
        .await
        .unwrap();

    let messages: Vec<_> = coordinator
        .logs()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.message)
        .collect();
    assert_eq!(messages.first().map(String::as_str), Some("[STARTED] backup"));
    assert!(messages.contains(&"second dump".to_string()));
    assert!(!messages.contains(&"first dump".to_string()));
}

#[tokio::test]
async fn stale_operation_can_be_cleared() {
    let backends = MemoryBackends::new();
    let crashed = backends.coordinator("default");
    let supervisor = backends.coordinator("default");

    let handle = crashed.start(OperationKind::Restore).await.unwrap();
    crashed.request_cancellation().await.unwrap();
    // The process holding the handle is gone.
    drop(handle);

    assert!(supervisor.clear_stale_operation().await.unwrap());
    assert!(!supervisor.is_operation_running().await.unwrap());
    assert!(!supervisor.token().is_cancelled().await.unwrap());
    assert!(!supervisor.clear_stale_operation().await.unwrap());

    let handle = supervisor.start(OperationKind::Backup).await.unwrap();
    supervisor.finish(handle).await.unwrap();
}
