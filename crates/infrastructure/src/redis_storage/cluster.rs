use async_trait::async_trait;
use broker_core::{BrokerError, BrokerResult, Context};
use parking_lot::RwLock;
use redis::aio::ConnectionLike;
use redis::cluster::{ClusterClient, ClusterClientBuilder};
use redis::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::{ClusterConfig, NodeAddress, RedisConfig, TopologyType};
use super::connection::{SharedConnection, StorageConnection};
use super::lifecycle::Lifecycle;
use super::metrics_collector::StorageMetrics;
use super::topology::Partitions;
use crate::storage::StorageProvider;

const COMPONENT: &str = "RedisClusterStorage";
const REFRESH_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// 一次拓扑刷新的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Unchanged,
    /// 槽归属变化，节点集合不变
    SlotsMoved,
    /// 节点集合发生变化
    NodesChanged,
    /// 新视图未通过成员校验，保留旧视图
    Rejected,
}

/// 比较新旧分区视图
pub fn evaluate_refresh(
    previous: &Partitions,
    refreshed: &Partitions,
    validate_membership: bool,
) -> RefreshOutcome {
    if refreshed.is_empty() {
        return RefreshOutcome::Rejected;
    }
    if validate_membership && !previous.is_empty() && !refreshed.shares_node_with(previous) {
        return RefreshOutcome::Rejected;
    }
    if previous == refreshed {
        RefreshOutcome::Unchanged
    } else if previous.nodes() == refreshed.nodes() {
        RefreshOutcome::SlotsMoved
    } else {
        RefreshOutcome::NodesChanged
    }
}

/// 初始化路径和刷新任务共享的集群状态
struct ClusterShared {
    client: ClusterClient,
    connection: SharedConnection,
    partitions: RwLock<Partitions>,
    config: ClusterConfig,
    metrics: Arc<StorageMetrics>,
}

impl ClusterShared {
    async fn read_partitions<C>(connection: &mut C) -> BrokerResult<Partitions>
    where
        C: ConnectionLike + Send,
    {
        let reply: Value = redis::cmd("CLUSTER")
            .arg("SLOTS")
            .query_async(connection)
            .await
            .map_err(|e| BrokerError::connection(format!("读取CLUSTER SLOTS失败: {e}")))?;
        Partitions::from_cluster_slots(&reply).map_err(BrokerError::connection)
    }

    async fn refresh(&self) -> BrokerResult<RefreshOutcome> {
        let mut connection = self
            .connection
            .current()
            .map_err(|_| BrokerError::NotInitialized(COMPONENT.to_string()))?;

        let refreshed = Self::read_partitions(&mut connection).await?;
        let previous = self.partitions.read().clone();
        let outcome =
            evaluate_refresh(&previous, &refreshed, self.config.validate_cluster_membership);

        match outcome {
            RefreshOutcome::Rejected => {
                warn!(
                    previous_nodes = previous.nodes().len(),
                    refreshed_nodes = refreshed.nodes().len(),
                    "Refreshed cluster view rejected by membership validation"
                );
                return Ok(outcome);
            }
            RefreshOutcome::Unchanged => return Ok(outcome),
            RefreshOutcome::SlotsMoved | RefreshOutcome::NodesChanged => {}
        }

        let node_count = refreshed.nodes().len();
        *self.partitions.write() = refreshed;
        self.metrics.record_topology_change();
        self.metrics.set_known_nodes(node_count as u32);
        info!(nodes = node_count, outcome = ?outcome, "Cluster topology changed");

        if outcome == RefreshOutcome::NodesChanged && self.config.close_stale_connections {
            self.replace_connection().await?;
        }
        Ok(outcome)
    }

    async fn replace_connection(&self) -> BrokerResult<()> {
        let fresh = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| BrokerError::connection(format!("重建集群连接失败: {e}")))?;

        if self.connection.replace(StorageConnection::Cluster(fresh)) {
            debug!("Cluster connection replaced after node set change");
        } else {
            debug!("Cluster storage destroyed during refresh, dropping new connection");
        }
        Ok(())
    }
}

struct RefreshTask {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    fn spawn(shared: Arc<ClusterShared>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let period = shared.config.refresh_period;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次tick立即触发，初始拓扑已在init中读取
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Cluster topology refresh task stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        shared.metrics.record_topology_refresh();
                        if let Err(e) = shared.refresh().await {
                            shared.metrics.record_topology_refresh_failure();
                            warn!(error = %e, "Cluster topology refresh failed");
                        }
                    }
                }
            }
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let abort = self.handle.abort_handle();
        if tokio::time::timeout(REFRESH_STOP_TIMEOUT, self.handle)
            .await
            .is_err()
        {
            warn!("Cluster topology refresh task did not stop in time, aborting");
            abort.abort();
        }
    }
}

struct ClusterState {
    shared: Arc<ClusterShared>,
    refresh: Option<RefreshTask>,
}

/// Redis集群存储
///
/// 通过第一个地址发现集群拓扑，命令按槽路由到对应主节点；
/// `redis.read` 允许时读命令可发往副本。
pub struct RedisClusterStorage {
    lifecycle: RwLock<Lifecycle<ClusterState>>,
    metrics: Arc<StorageMetrics>,
}

impl RedisClusterStorage {
    pub fn new() -> Self {
        Self {
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            metrics: Arc::new(StorageMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<StorageMetrics> {
        self.metrics.clone()
    }

    /// 当前分区视图快照，未初始化时返回 `None`
    pub fn partitions(&self) -> Option<Partitions> {
        self.lifecycle
            .read()
            .ready()
            .map(|state| state.shared.partitions.read().clone())
    }

    /// 按当前分区视图查找键所在槽的主节点，用于诊断路由
    pub fn node_for_key(&self, key: &str) -> Option<NodeAddress> {
        self.lifecycle.read().ready().and_then(|state| {
            state
                .shared
                .partitions
                .read()
                .master_for_key(key.as_bytes())
                .cloned()
        })
    }

    /// 立即刷新一次拓扑，不影响周期任务
    pub async fn refresh_topology(&self) -> BrokerResult<RefreshOutcome> {
        let shared = self
            .lifecycle
            .read()
            .ready()
            .map(|state| state.shared.clone())
            .ok_or_else(|| BrokerError::NotInitialized(COMPONENT.to_string()))?;

        shared.metrics.record_topology_refresh();
        shared.refresh().await.inspect_err(|_| {
            shared.metrics.record_topology_refresh_failure();
        })
    }

    fn build_client(
        redis_config: &RedisConfig,
        cluster_config: &ClusterConfig,
    ) -> BrokerResult<ClusterClient> {
        let seed = redis_config.cluster_seed_url()?;
        let mut builder = ClusterClientBuilder::new(vec![seed])
            .retries(cluster_config.max_redirects)
            .connection_timeout(redis_config.connect_timeout)
            .response_timeout(redis_config.command_timeout);
        if cluster_config.read_from.allows_replicas() {
            builder = builder.read_from_replicas();
        }
        builder
            .build()
            .map_err(|e| BrokerError::connection(format!("创建Redis集群客户端失败: {e}")))
    }

    async fn connect(
        redis_config: &RedisConfig,
        cluster_config: ClusterConfig,
        metrics: Arc<StorageMetrics>,
    ) -> BrokerResult<ClusterState> {
        let client = Self::build_client(redis_config, &cluster_config)?;
        let mut connection = client.get_async_connection().await.map_err(|e| {
            BrokerError::connection(format!("连接Redis集群 {} 失败: {e}", redis_config.seed()))
        })?;

        let partitions = ClusterShared::read_partitions(&mut connection).await?;
        if !partitions.covers_all_slots() {
            warn!("Cluster slots are not fully covered");
        }
        metrics.set_known_nodes(partitions.nodes().len() as u32);

        let periodic = cluster_config.periodic_refresh_enabled;
        let shared = Arc::new(ClusterShared {
            client,
            connection: SharedConnection::new(StorageConnection::Cluster(connection)),
            partitions: RwLock::new(partitions),
            config: cluster_config,
            metrics,
        });
        let refresh = periodic.then(|| RefreshTask::spawn(shared.clone()));

        Ok(ClusterState { shared, refresh })
    }
}

impl Default for RedisClusterStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for RedisClusterStorage {
    async fn init(&self, config: &Context) -> BrokerResult<()> {
        TopologyType::Cluster.ensure(config)?;
        let redis_config = RedisConfig::from_context(config)?;
        let cluster_config = ClusterConfig::from_context(config)?;
        if redis_config.database != 0 {
            warn!(
                database = redis_config.database,
                "Redis cluster only supports database 0, ignoring redis.database"
            );
        }

        self.lifecycle.write().begin_init(COMPONENT)?;
        debug!(config = ?redis_config, cluster = ?cluster_config, "Connecting to Redis cluster");

        let read_from = cluster_config.read_from;
        let refresh_period = cluster_config.refresh_period;
        match Self::connect(&redis_config, cluster_config, self.metrics.clone()).await {
            Ok(state) => {
                let periodic = state.refresh.is_some();
                let nodes = state.shared.partitions.read().nodes().len();
                let finished = self.lifecycle.write().finish_init(state);
                if let Err(state) = finished {
                    warn!("{COMPONENT} destroyed during initialization, releasing cluster state");
                    release(state).await;
                    return Err(BrokerError::NotInitialized(COMPONENT.to_string()));
                }
                self.metrics.record_connection_established(TopologyType::Cluster.as_str());
                info!(
                    seed = %redis_config.seed(),
                    nodes,
                    read_from = %read_from,
                    periodic_refresh = periodic,
                    refresh_period_secs = refresh_period.as_secs(),
                    "Redis cluster storage initialized"
                );
                Ok(())
            }
            Err(e) => {
                self.lifecycle.write().fail_init();
                self.metrics.record_connection_error(TopologyType::Cluster.as_str());
                error!(error = %e, "Redis cluster storage initialization failed");
                Err(e)
            }
        }
    }

    async fn destroy(&self) {
        let state = self.lifecycle.write().take_for_destroy();
        match state {
            Some(state) => {
                release(state).await;
                info!("Redis cluster storage destroyed");
            }
            None => debug!("{COMPONENT} destroy skipped, no live connection"),
        }
    }

    fn connection(&self) -> BrokerResult<SharedConnection> {
        let lifecycle = self.lifecycle.read();
        lifecycle
            .ready()
            .map(|state| state.shared.connection.clone())
            .ok_or_else(|| {
                BrokerError::NotInitialized(format!("{COMPONENT} ({})", lifecycle.name()))
            })
    }
}

/// 先释放连接，再停止刷新任务，最后释放客户端
async fn release(state: ClusterState) {
    let ClusterState { shared, refresh } = state;

    drop(shared.connection.release());

    if let Some(task) = refresh {
        task.stop().await;
    }

    drop(shared);
}
