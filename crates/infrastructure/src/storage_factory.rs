use std::sync::Arc;
use tracing::{debug, info};

use broker_core::{BrokerResult, Context};

use crate::redis_storage::config::TYPE_KEY;
use crate::redis_storage::{RedisClusterStorage, RedisSingleStorage, TopologyType};
use crate::storage::StorageProvider;

pub struct StorageFactory;

impl StorageFactory {
    /// 按 `redis.type` 创建存储提供者，返回的实例尚未初始化
    pub fn create(config: &Context) -> BrokerResult<Arc<dyn StorageProvider>> {
        let topology = match config.get_string(TYPE_KEY) {
            None => TopologyType::Single,
            Some(value) => value.parse::<TopologyType>()?,
        };
        debug!("Creating storage provider with type: {}", topology.as_str());

        match topology {
            TopologyType::Single => {
                info!("Using single-node Redis storage");
                Ok(Arc::new(RedisSingleStorage::new()))
            }
            TopologyType::Cluster => {
                info!("Using Redis cluster storage");
                Ok(Arc::new(RedisClusterStorage::new()))
            }
        }
    }
}

pub fn create_storage(config: &Context) -> BrokerResult<Arc<dyn StorageProvider>> {
    StorageFactory::create(config)
}
