//! Pooled Redis connection shared by the Redis-backed store, log channel and job registry.

use std::time::Duration;

use config::shared::RedisConfig;
use fred::prelude::{ClientLike, EventInterface, KeysInterface, Pool, ReconnectPolicy, Server};
use fred::prelude::{ServerConfig, TcpConfig};
use fred::types::config::UnresponsiveConfig;
use fred::types::{Builder, Key};
use futures::future::join_all;
use secrecy::ExposeSecret;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error};

use crate::br_error;
use crate::error::{BrResult, ErrorKind};

/// Number of keys requested per `SCAN` page.
const SCAN_PAGE_SIZE: u32 = 100;

/// Cloneable handle on a pool of Redis connections.
#[derive(Clone)]
pub struct RedisClient {
    pool: Pool,
}

impl RedisClient {
    /// Connects a pool to the configured server and waits until it is usable.
    pub async fn connect(config: &RedisConfig) -> BrResult<Self> {
        let pool = Builder::default_centralized()
            .with_config(|redis_config| {
                redis_config.username = config.username.clone();
                redis_config.password = config
                    .password
                    .as_ref()
                    .map(|password| password.expose_secret().to_owned());
                redis_config.server = ServerConfig::Centralized {
                    server: Server::new(config.host.clone(), config.port),
                };
            })
            .with_connection_config(|connection| {
                connection.internal_command_timeout = Duration::from_secs(5);
                connection.reconnect_on_auth_error = true;
                connection.tcp = TcpConfig {
                    #[cfg(target_os = "linux")]
                    user_timeout: Some(Duration::from_secs(5)),
                    ..Default::default()
                };
                connection.unresponsive = UnresponsiveConfig {
                    max_timeout: Some(Duration::from_secs(10)),
                    interval: Duration::from_secs(3),
                };
            })
            .with_performance_config(|performance| {
                performance.default_command_timeout = Duration::from_secs(5);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 1, 2000, 5))
            .build_pool(config.pool_size)
            .map_err(|err| {
                br_error!(
                    ErrorKind::CoordinationStoreFailed,
                    "Invalid Redis configuration",
                    err.to_string(),
                    source: err
                )
            })?;

        for client in pool.clients() {
            let mut error_rx = client.error_rx();
            let mut reconnect_rx = client.reconnect_rx();

            tokio::spawn(async move {
                loop {
                    match error_rx.recv().await {
                        Ok((error, Some(server))) => {
                            error!("redis client ({server:?}) error: {error:?}");
                        }
                        Ok((error, None)) => {
                            error!("redis client error: {error:?}");
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            tokio::spawn(async move {
                loop {
                    match reconnect_rx.recv().await {
                        Ok(server) => debug!("redis client connected to {server:?}"),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }

        let handles = pool.connect_pool();
        pool.wait_for_connect().await.map_err(|err| {
            br_error!(
                ErrorKind::CoordinationStoreFailed,
                "Cannot connect to Redis",
                err.to_string(),
                source: err
            )
        })?;
        debug!(host = %config.host, port = config.port, "connected to redis");

        tokio::spawn(async move {
            let _results = join_all(handles).await;
        });

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Lists every key matching `pattern` with `SCAN`.
    ///
    /// Does not work against Redis cluster.
    pub async fn scan_keys(&self, pattern: &str) -> BrResult<Vec<String>> {
        let mut cursor = "0".to_string();
        let mut found = Vec::new();

        loop {
            let (next_cursor, keys): (String, Vec<Key>) = self
                .pool
                .scan_page(cursor, pattern.to_owned(), Some(SCAN_PAGE_SIZE), None)
                .await?;

            found.extend(keys.iter().filter_map(|key| key.as_str().map(str::to_owned)));

            cursor = next_cursor;
            if cursor == "0" {
                break;
            }
        }

        found.sort();
        found.dedup();

        Ok(found)
    }
}

/// Escapes glob metacharacters so `prefix` matches literally in a `SCAN` pattern.
pub fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}
