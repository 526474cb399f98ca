use async_trait::async_trait;
use broker_core::{BrokerResult, Context};

use crate::redis_storage::commands::{
    GeoCommands, HashCommands, HllCommands, KeyCommands, ListCommands, ScriptingCommands,
    ServerCommands, SetCommands, SortedSetCommands, StringCommands,
};
use crate::redis_storage::SharedConnection;

/// 存储提供者抽象接口
///
/// broker 启动时选择一个实现并调用一次 `init`，之后由多个连接处理任务并发使用命令门面。
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// 校验配置并建立连接
    ///
    /// 连接失败是致命错误，不在内部重试；实例进入不可用状态。
    async fn init(&self, config: &Context) -> BrokerResult<()>;

    /// 释放连接和后台任务，未初始化时为空操作，不返回错误
    async fn destroy(&self);

    /// 与命令门面共享的连接槽，未初始化或已销毁时返回 `NotInitialized`
    fn connection(&self) -> BrokerResult<SharedConnection>;

    fn hash(&self) -> BrokerResult<HashCommands> {
        self.connection().map(HashCommands::new)
    }

    fn string(&self) -> BrokerResult<StringCommands> {
        self.connection().map(StringCommands::new)
    }

    fn key(&self) -> BrokerResult<KeyCommands> {
        self.connection().map(KeyCommands::new)
    }

    fn list(&self) -> BrokerResult<ListCommands> {
        self.connection().map(ListCommands::new)
    }

    fn set(&self) -> BrokerResult<SetCommands> {
        self.connection().map(SetCommands::new)
    }

    fn sorted_set(&self) -> BrokerResult<SortedSetCommands> {
        self.connection().map(SortedSetCommands::new)
    }

    fn script(&self) -> BrokerResult<ScriptingCommands> {
        self.connection().map(ScriptingCommands::new)
    }

    fn server(&self) -> BrokerResult<ServerCommands> {
        self.connection().map(ServerCommands::new)
    }

    fn hll(&self) -> BrokerResult<HllCommands> {
        self.connection().map(HllCommands::new)
    }

    fn geo(&self) -> BrokerResult<GeoCommands> {
        self.connection().map(GeoCommands::new)
    }
}
