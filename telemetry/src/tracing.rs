use std::sync::Once;

use config::Environment;
use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

/// Default directives used when `RUST_LOG` is not set.
const DEFAULT_LOG_DIRECTIVES: &str = "info,sqlx=warn,fred=warn";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[source] std::io::Error),

    #[error("failed to bridge `log` records into tracing: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("a global tracing subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Flushes buffered log lines when dropped.
///
/// Must be held until the process exits, otherwise trailing lines are lost.
#[must_use = "dropping the flusher stops the background log writer"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for a binary.
///
/// Lines are written to stderr from a background thread, leaving stdout to command
/// output. Production emits JSON, other environments emit human readable lines.
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(app_name: &str, tenant_id: Option<&str>) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load().map_err(TracingError::Environment)?;

    tracing_log::LogTracer::init()?;

    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    let format_layer = if environment.is_non_production() {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(format_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        app = app_name,
        tenant_id = tenant_id.unwrap_or("-"),
        environment = %environment,
        "tracing initialized"
    );

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test writer subscriber once per test binary.
///
/// Output is captured by the test harness and shown only for failing tests.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));
        let subscriber = tracing_subscriber::registry().with(filter).with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_target(true),
        );

        // Another harness may have installed a subscriber already.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
