use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use metrics::{counter, gauge};

/// Redis存储提供者指标
///
/// 计数器为原子操作，可在初始化路径和拓扑刷新任务之间共享。
#[derive(Debug, Clone, Default)]
pub struct StorageMetrics {
    pub connections_established: Arc<AtomicU64>,
    pub connection_errors: Arc<AtomicU64>,
    pub topology_refreshes: Arc<AtomicU64>,
    pub topology_refresh_failures: Arc<AtomicU64>,
    pub topology_changes: Arc<AtomicU64>,
    pub known_nodes: Arc<AtomicU32>,
}

impl StorageMetrics {
    pub fn record_connection_established(&self, topology: &'static str) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        counter!("storage_connections_established_total", "topology" => topology).increment(1);
    }

    pub fn record_connection_error(&self, topology: &'static str) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
        counter!("storage_connection_errors_total", "topology" => topology).increment(1);
    }

    pub fn record_topology_refresh(&self) {
        self.topology_refreshes.fetch_add(1, Ordering::Relaxed);
        counter!("storage_topology_refresh_total").increment(1);
    }

    pub fn record_topology_refresh_failure(&self) {
        self.topology_refresh_failures.fetch_add(1, Ordering::Relaxed);
        counter!("storage_topology_refresh_failures_total").increment(1);
    }

    pub fn record_topology_change(&self) {
        self.topology_changes.fetch_add(1, Ordering::Relaxed);
        counter!("storage_topology_changes_total").increment(1);
    }

    pub fn set_known_nodes(&self, count: u32) {
        self.known_nodes.store(count, Ordering::Relaxed);
        gauge!("storage_cluster_known_nodes").set(count as f64);
    }

    pub fn get_stats(&self) -> StorageMetricsSnapshot {
        StorageMetricsSnapshot {
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            topology_refreshes: self.topology_refreshes.load(Ordering::Relaxed),
            topology_refresh_failures: self.topology_refresh_failures.load(Ordering::Relaxed),
            topology_changes: self.topology_changes.load(Ordering::Relaxed),
            known_nodes: self.known_nodes.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageMetricsSnapshot {
    pub connections_established: u64,
    pub connection_errors: u64,
    pub topology_refreshes: u64,
    pub topology_refresh_failures: u64,
    pub topology_changes: u64,
    pub known_nodes: u32,
}
