pub mod redis_storage;
pub mod storage;
pub mod storage_factory;

pub use redis_storage::{
    RedisClusterStorage, RedisSingleStorage, SharedConnection, StorageConnection, StorageMetrics,
};
pub use storage::*;
pub use storage_factory::*;
