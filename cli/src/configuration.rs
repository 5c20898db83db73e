use config::load_config;
use config::shared::{BackupRestoreConfig, CoordinationStoreConfig, ValidationError};

use crate::error::{CliError, CliResult};

/// Loads the configuration from `BR_CONFIGURATION_DIR` and the environment and validates it.
pub fn load_backup_restore_config() -> CliResult<BackupRestoreConfig> {
    let config = load_config::<BackupRestoreConfig>().map_err(CliError::config)?;
    config.validate().map_err(CliError::config)?;
    ensure_shared_coordination(&config)?;

    Ok(config)
}

/// Rejects coordination stores that other processes cannot see.
///
/// The flags `brctl` reads and writes belong to the services, so a process-local store
/// would make every command act on an empty state.
pub fn ensure_shared_coordination(config: &BackupRestoreConfig) -> CliResult<()> {
    match config.coordination {
        CoordinationStoreConfig::Memory => Err(process_local_store_error()),
        CoordinationStoreConfig::Redis(_) => Ok(()),
    }
}

pub fn process_local_store_error() -> CliError {
    CliError::config(ValidationError::InvalidFieldValue {
        field: "coordination.type".to_string(),
        constraint: "brctl needs a shared store, use `redis`".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(coordination: &str) -> BackupRestoreConfig {
        serde_json::from_str(&format!(
            r#"{{
                "tenant_id": "default",
                "database": {{
                    "host": "localhost",
                    "port": 5432,
                    "name": "app",
                    "username": "app_user"
                }},
                "coordination": {coordination}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn memory_coordination_is_rejected() {
        let err = ensure_shared_coordination(&config_with(r#"{"type": "memory"}"#)).unwrap_err();

        assert_eq!(err.category(), "configuration error");
        assert!(err.to_string().contains("coordination.type"));
    }

    #[test]
    fn redis_coordination_is_accepted() {
        let config = config_with(r#"{"type": "redis", "host": "redis.internal"}"#);

        assert!(ensure_shared_coordination(&config).is_ok());
    }
}
