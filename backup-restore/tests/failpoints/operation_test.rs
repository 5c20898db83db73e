use backup_restore::error::ErrorKind;
use backup_restore::failpoints::OPERATION__AFTER_WORK;
use backup_restore::jobs::{JobRegistry, JobSet};
use backup_restore::store::CoordinationStore;
use backup_restore::test_utils::coordinator::MemoryBackends;
use backup_restore::test_utils::failpoints::CustomFailScenario;
use backup_restore::test_utils::jobs::tenant_job;
use backup_restore::types::OperationKind;
use telemetry::tracing::init_test_tracing;

#[tokio::test(start_paused = true)]
async fn failure_after_work_skips_post_processing_and_cleans_up() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(OPERATION__AFTER_WORK, "return(query_failed)")]);

    let backends = MemoryBackends::new();
    let queue = JobSet::Queue("default".to_string());
    backends
        .registry
        .push(queue.clone(), tenant_job("default", "default"))
        .await;
    backends.store.set("default:cache:posts", "[]").await.unwrap();
    let coordinator = backends.coordinator("default");

    let err = coordinator
        .run(OperationKind::Restore, |_context| async move { Ok(()) })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DatabaseQueryFailed);
    assert_eq!(backends.registry.jobs(&queue).await.unwrap().len(), 1);
    assert!(backends.store.get("default:cache:posts").await.unwrap().is_some());

    let coordination = coordinator.coordination();
    assert!(!coordination.is_running().await.unwrap());
    assert!(!coordination.is_readonly().await.unwrap());
    assert!(!coordination.is_paused().await.unwrap());
}
