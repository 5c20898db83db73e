use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Backend holding the cross-process coordination flags and the log channel.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum CoordinationStoreConfig {
    /// Process-local store, only useful for tests and single-process embedding.
    #[default]
    Memory,
    /// Redis server shared by every worker process.
    Redis(RedisConfig),
}

impl CoordinationStoreConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            CoordinationStoreConfig::Memory => Ok(()),
            CoordinationStoreConfig::Redis(config) => config.validate(),
        }
    }
}

/// Connection settings for the Redis coordination store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RedisConfig {
    /// Host on which Redis is running.
    #[serde(default = "default_redis_host")]
    pub host: String,
    /// Port on which Redis is running.
    #[serde(default = "default_redis_port")]
    pub port: u16,
    /// Redis user name.
    pub username: Option<String>,
    /// Redis password, optional when using trust authentication.
    pub password: Option<SecretString>,
    /// Number of pooled connections.
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,
}

impl RedisConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";

    pub const DEFAULT_PORT: u16 = 6379;

    pub const DEFAULT_POOL_SIZE: usize = 5;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pool_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "coordination.pool_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn default_redis_host() -> String {
    RedisConfig::DEFAULT_HOST.to_string()
}

fn default_redis_port() -> u16 {
    RedisConfig::DEFAULT_PORT
}

fn default_redis_pool_size() -> usize {
    RedisConfig::DEFAULT_POOL_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_defaults_are_applied() {
        let config: CoordinationStoreConfig =
            serde_json::from_str(r#"{"type": "redis"}"#).unwrap();

        let CoordinationStoreConfig::Redis(redis) = config else {
            panic!("expected a redis configuration");
        };
        assert_eq!(redis.host, "127.0.0.1");
        assert_eq!(redis.port, 6379);
        assert_eq!(redis.pool_size, 5);
        assert!(redis.password.is_none());
    }

    #[test]
    fn empty_pool_is_rejected() {
        let config: CoordinationStoreConfig =
            serde_json::from_str(r#"{"type": "redis", "pool_size": 0}"#).unwrap();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { .. })
        ));
    }
}
