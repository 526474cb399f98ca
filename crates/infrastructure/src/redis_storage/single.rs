use async_trait::async_trait;
use broker_core::{BrokerError, BrokerResult, Context};
use parking_lot::RwLock;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncConnectionConfig, Client};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::config::{RedisConfig, TopologyType};
use super::connection::{SharedConnection, StorageConnection};
use super::lifecycle::Lifecycle;
use super::metrics_collector::StorageMetrics;
use crate::storage::StorageProvider;

const COMPONENT: &str = "RedisSingleStorage";

struct SingleState {
    connection: SharedConnection,
}

/// 单节点Redis存储
///
/// 只使用 `redis.address` 中的第一个地址，读写都发往该节点。
pub struct RedisSingleStorage {
    lifecycle: RwLock<Lifecycle<SingleState>>,
    metrics: Arc<StorageMetrics>,
}

impl RedisSingleStorage {
    pub fn new() -> Self {
        Self {
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            metrics: Arc::new(StorageMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<StorageMetrics> {
        self.metrics.clone()
    }

    async fn connect(config: &RedisConfig) -> BrokerResult<ConnectionManager> {
        let url = config.connection_url()?;
        let client = Client::open(url.as_str())
            .map_err(|e| BrokerError::connection(format!("创建Redis客户端失败: {e}")))?;

        // 探测连接只尝试一次，不可达时直接失败
        let ping_config = AsyncConnectionConfig::new()
            .set_connection_timeout(config.connect_timeout)
            .set_response_timeout(config.command_timeout);
        let mut ping_conn = client
            .get_multiplexed_async_connection_with_config(&ping_config)
            .await
            .map_err(|e| {
                BrokerError::connection(format!("连接Redis {} 失败: {e}", config.seed()))
            })?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut ping_conn)
            .await
            .map_err(|e| BrokerError::connection(format!("Redis PING失败: {e}")))?;
        if pong != "PONG" {
            return Err(BrokerError::connection(format!(
                "Unexpected PING response: {pong}"
            )));
        }

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.connect_timeout)
            .set_response_timeout(config.command_timeout);
        client
            .get_connection_manager_with_config(manager_config)
            .await
            .map_err(|e| BrokerError::connection(format!("创建Redis连接管理器失败: {e}")))
    }
}

impl Default for RedisSingleStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for RedisSingleStorage {
    async fn init(&self, config: &Context) -> BrokerResult<()> {
        TopologyType::Single.ensure(config)?;
        let redis_config = RedisConfig::from_context(config)?;
        if redis_config.addresses.len() > 1 {
            warn!(
                addresses = redis_config.addresses.len(),
                seed = %redis_config.seed(),
                "Single-node storage only uses the first configured address"
            );
        }

        self.lifecycle.write().begin_init(COMPONENT)?;
        debug!(config = ?redis_config, "Connecting to single-node Redis");

        match Self::connect(&redis_config).await {
            Ok(connection) => {
                let finished = self
                    .lifecycle
                    .write()
                    .finish_init(SingleState {
                        connection: SharedConnection::new(StorageConnection::Single(connection)),
                    });
                if finished.is_err() {
                    warn!("{COMPONENT} destroyed during initialization, dropping connection");
                    return Err(BrokerError::NotInitialized(COMPONENT.to_string()));
                }
                self.metrics.record_connection_established(TopologyType::Single.as_str());
                info!(
                    address = %redis_config.seed(),
                    database = redis_config.database,
                    "Single-node Redis storage initialized"
                );
                Ok(())
            }
            Err(e) => {
                self.lifecycle.write().fail_init();
                self.metrics.record_connection_error(TopologyType::Single.as_str());
                error!(error = %e, "Single-node Redis storage initialization failed");
                Err(e)
            }
        }
    }

    async fn destroy(&self) {
        let state = self.lifecycle.write().take_for_destroy();
        match state {
            Some(state) => {
                drop(state.connection.release());
                info!("Single-node Redis storage destroyed");
            }
            None => debug!("{COMPONENT} destroy skipped, no live connection"),
        }
    }

    fn connection(&self) -> BrokerResult<SharedConnection> {
        let lifecycle = self.lifecycle.read();
        lifecycle
            .ready()
            .map(|state| state.connection.clone())
            .ok_or_else(|| {
                BrokerError::NotInitialized(format!("{COMPONENT} ({})", lifecycle.name()))
            })
    }
}
