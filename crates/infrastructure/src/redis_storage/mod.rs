//! 基于Redis的存储提供者
//!
//! 提供单节点和集群两种拓扑的实现，按 `redis.type` 选择，
//! 两者共享同一套命令门面。

pub mod cluster;
pub mod commands;
pub mod config;
pub mod connection;
mod lifecycle;
pub mod metrics_collector;
pub mod single;
pub mod topology;

// 重新导出公共接口
pub use cluster::{evaluate_refresh, RedisClusterStorage, RefreshOutcome};
pub use config::{ClusterConfig, NodeAddress, ReadFrom, RedisConfig, TopologyType};
pub use connection::{SharedConnection, StorageConnection};
pub use metrics_collector::{StorageMetrics, StorageMetricsSnapshot};
pub use single::RedisSingleStorage;
pub use topology::{key_slot, Partitions, SlotRange};
