use std::sync::Arc;

use parking_lot::RwLock;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::cluster_async::ClusterConnection;
use redis::{Cmd, ErrorKind, Pipeline, RedisError, RedisFuture, RedisResult, Value};

/// 存储提供者持有的活动连接
///
/// 两种连接都是可克隆的多路复用句柄，克隆后可被多个调用方并发使用，无需额外加锁。
#[derive(Clone)]
pub enum StorageConnection {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

impl StorageConnection {
    pub fn is_cluster(&self) -> bool {
        matches!(self, StorageConnection::Cluster(_))
    }
}

impl ConnectionLike for StorageConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            StorageConnection::Single(conn) => conn.req_packed_command(cmd),
            StorageConnection::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            StorageConnection::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            StorageConnection::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            StorageConnection::Single(conn) => conn.get_db(),
            StorageConnection::Cluster(conn) => conn.get_db(),
        }
    }
}

/// 提供者与命令门面共享的连接槽
///
/// 提供者是唯一能清空槽的一方；`destroy` 后所有门面上的命令立即失败，
/// 底层连接在最后一个进行中的命令结束后关闭。
#[derive(Clone)]
pub struct SharedConnection {
    slot: Arc<RwLock<Option<StorageConnection>>>,
}

impl SharedConnection {
    pub(crate) fn new(connection: StorageConnection) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(connection))),
        }
    }

    /// 已释放的空槽
    pub(crate) fn released() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// 当前连接句柄，槽已清空时返回 `ClientError`
    pub fn current(&self) -> RedisResult<StorageConnection> {
        self.slot.read().clone().ok_or_else(|| {
            RedisError::from((ErrorKind::ClientError, "存储连接已释放，提供者尚未初始化或已销毁"))
        })
    }

    pub fn is_released(&self) -> bool {
        self.slot.read().is_none()
    }

    /// 替换连接；槽已清空时不放回，返回 `false`
    pub(crate) fn replace(&self, connection: StorageConnection) -> bool {
        let mut slot = self.slot.write();
        if slot.is_some() {
            *slot = Some(connection);
            true
        } else {
            false
        }
    }

    /// 清空槽并交出连接
    pub(crate) fn release(&self) -> Option<StorageConnection> {
        self.slot.write().take()
    }
}

impl ConnectionLike for SharedConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        Box::pin(async move {
            let mut connection = self.current()?;
            connection.req_packed_command(cmd).await
        })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let mut connection = self.current()?;
            connection.req_packed_commands(cmd, offset, count).await
        })
    }

    fn get_db(&self) -> i64 {
        self.slot.read().as_ref().map_or(0, |connection| connection.get_db())
    }
}
