use std::io::Write;

use backup_restore::coordinator::{CoordinatorSettings, OperationCoordinator};
use backup_restore::jobs::JobRegistry;
use backup_restore::jobs::redis::RedisJobRegistry;
use backup_restore::logs::LogChannel;
use backup_restore::logs::redis::RedisLogChannel;
use backup_restore::redis::RedisClient;
use backup_restore::schema::SchemaSwapper;
use backup_restore::schema::postgres::PgSchemaSwapper;
use backup_restore::store::CoordinationStore;
use backup_restore::store::redis::RedisStore;
use backup_restore::types::TenantId;
use config::Environment;
use config::shared::{BackupRestoreConfig, CoordinationStoreConfig};
use postgres::db::lazy_database_pool;
use serde::Serialize;
use tracing::{info, warn};

use crate::Command;
use crate::configuration::process_local_store_error;
use crate::error::CliResult;

/// Connections used by a single command.
const MAX_DATABASE_CONNECTIONS: u32 = 2;

#[derive(Debug, Serialize)]
struct CommandOutcome {
    done: bool,
}

/// Builds a coordinator for the configured backends and runs `command` with it.
pub async fn run_command(
    config: BackupRestoreConfig,
    environment: Environment,
    command: Command,
) -> CliResult<()> {
    let tenant = TenantId::new(config.tenant_id.clone())?;
    let settings = CoordinatorSettings::from_config(&config, environment);

    // Connections are only opened by the commands that query the database.
    let pool = lazy_database_pool(&config.database, MAX_DATABASE_CONNECTIONS);
    let swapper = PgSchemaSwapper::new(pool, config.owner());

    match &config.coordination {
        CoordinationStoreConfig::Memory => Err(process_local_store_error()),
        CoordinationStoreConfig::Redis(redis_config) => {
            let client = RedisClient::connect(redis_config).await?;

            let coordinator = OperationCoordinator::new(
                tenant.clone(),
                RedisStore::new(client.clone()),
                RedisLogChannel::new(client.clone(), &tenant),
                RedisJobRegistry::new(client),
                swapper,
                settings,
            );
            execute(&coordinator, command).await
        }
    }
}

async fn execute<S, L, J, W>(
    coordinator: &OperationCoordinator<S, L, J, W>,
    command: Command,
) -> CliResult<()>
where
    S: CoordinationStore + Clone,
    L: LogChannel + Clone,
    J: JobRegistry + Clone,
    W: SchemaSwapper + Clone,
{
    let tenant_id = coordinator.tenant().as_str();

    match command {
        Command::Status => {
            let status = coordinator.status().await?;
            print_json(&status)
        }
        Command::Cancel => {
            coordinator.request_cancellation().await?;
            info!(tenant_id, "cancellation requested");
            print_json(&CommandOutcome { done: true })
        }
        Command::Rollback => {
            let rolled_back = coordinator.rollback().await?;
            if !rolled_back {
                warn!(tenant_id, "no backup tables found, nothing was rolled back");
            }
            print_json(&CommandOutcome { done: rolled_back })
        }
        Command::Logs { plain } => {
            let entries = coordinator.logs().await?;
            if !plain {
                return print_json(&entries);
            }

            let mut stdout = std::io::stdout().lock();
            for entry in entries {
                writeln!(stdout, "{entry}")?;
            }

            Ok(())
        }
        Command::ClearStale => {
            let cleared = coordinator.clear_stale_operation().await?;
            info!(tenant_id, cleared, "stale operation flags cleared");
            print_json(&CommandOutcome { done: cleared })
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;

    Ok(())
}
