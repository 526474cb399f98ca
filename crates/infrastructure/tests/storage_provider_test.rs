use broker_core::{BrokerError, Context};
use broker_infrastructure::{
    create_storage, RedisClusterStorage, RedisSingleStorage, StorageProvider,
};

/// 指向一个不可达端口的配置
fn unreachable_context(topology: Option<&str>) -> Context {
    let context = Context::new();
    context.put("redis.address", "127.0.0.1:1");
    context.put("redis.connectTimeout", "500");
    context.put("redis.commandTimeout", "500");
    if let Some(topology) = topology {
        context.put("redis.type", topology);
    }
    context
}

#[test]
fn test_facades_before_init_fail() {
    let single = RedisSingleStorage::new();
    assert!(matches!(single.hash(), Err(BrokerError::NotInitialized(_))));
    assert!(matches!(single.string(), Err(BrokerError::NotInitialized(_))));
    assert!(matches!(single.geo(), Err(BrokerError::NotInitialized(_))));

    let cluster = RedisClusterStorage::new();
    assert!(matches!(cluster.key(), Err(BrokerError::NotInitialized(_))));
    assert!(matches!(cluster.script(), Err(BrokerError::NotInitialized(_))));
    assert!(cluster.partitions().is_none());
}

#[tokio::test]
async fn test_destroy_without_init_is_noop() {
    let single = RedisSingleStorage::new();
    single.destroy().await;
    single.destroy().await;

    let cluster = RedisClusterStorage::new();
    cluster.destroy().await;
    assert!(matches!(cluster.connection(), Err(BrokerError::NotInitialized(_))));
}

#[tokio::test]
async fn test_cluster_rejects_single_topology() {
    let context = unreachable_context(Some("single"));
    context.put("redis.read", "master");

    let cluster = RedisClusterStorage::new();
    match cluster.init(&context).await {
        Err(BrokerError::ConfigState {
            key,
            expected,
            actual,
        }) => {
            assert_eq!(key, "redis.type");
            assert_eq!(expected, "cluster");
            assert_eq!(actual, "single");
        }
        other => panic!("expected config state error, got {other:?}"),
    }

    // 配置错误不消耗初始化机会，也不计为连接失败
    assert_eq!(cluster.metrics().get_stats().connection_errors, 0);
    let err = cluster.init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::ConfigState { .. }));
}

#[tokio::test]
async fn test_cluster_requires_explicit_type() {
    let context = unreachable_context(None);
    context.put("redis.read", "master");

    let err = RedisClusterStorage::new().init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::ConfigState { .. }));
    assert!(err.to_string().contains("<未设置>"));
}

#[tokio::test]
async fn test_single_rejects_cluster_topology() {
    let context = unreachable_context(Some("cluster"));
    let err = RedisSingleStorage::new().init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::ConfigState { .. }));
}

#[tokio::test]
async fn test_cluster_read_policy_validation() {
    let context = unreachable_context(Some("cluster"));
    let err = RedisClusterStorage::new().init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::MissingConfig { .. }));

    context.put("redis.read", "everywhere");
    let err = RedisClusterStorage::new().init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::Format { .. }));
}

#[tokio::test]
async fn test_missing_address() {
    let context = Context::new();
    let err = RedisSingleStorage::new().init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::MissingConfig { .. }));
}

#[tokio::test]
async fn test_single_connection_failure_is_fatal() {
    let context = unreachable_context(None);
    let storage = RedisSingleStorage::new();

    let err = storage.init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::Connection(_)));
    assert!(err.is_fatal());
    assert_eq!(storage.metrics().get_stats().connection_errors, 1);

    let err = storage.init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::AlreadyInitialized(_)));
    assert!(matches!(storage.hash(), Err(BrokerError::NotInitialized(_))));

    storage.destroy().await;
}

#[tokio::test]
async fn test_cluster_connection_failure_is_fatal() {
    let context = unreachable_context(Some("cluster"));
    context.put("redis.read", "replicaPreferred");
    context.put("redis.cluster.periodicRefreshEnabled", "true");
    let storage = RedisClusterStorage::new();

    let err = storage.init(&context).await.unwrap_err();
    assert!(matches!(err, BrokerError::Connection(_)));
    assert!(storage.partitions().is_none());
    storage.destroy().await;
}

#[test]
fn test_factory_selects_topology() {
    let context = Context::new();
    assert!(create_storage(&context).is_ok());

    context.put("redis.type", "cluster");
    assert!(create_storage(&context).is_ok());

    context.put("redis.type", "sentinel");
    let err = create_storage(&context).err().unwrap();
    assert!(matches!(err, BrokerError::ConfigState { .. }));
    assert!(err.to_string().contains("sentinel"));
}
