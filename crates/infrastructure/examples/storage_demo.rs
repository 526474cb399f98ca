use anyhow::Result;
use broker_core::Context;
use broker_infrastructure::{create_storage, RedisClusterStorage, StorageProvider};

/// Demonstrates the storage provider against a local Redis
///
/// To run this example:
/// 1. Start a Redis server on localhost:6379
/// 2. Run: cargo run --example storage_demo
///
/// Pass `cluster` as the first argument to connect to a cluster seeded at localhost:7000.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let context = Context::new();
    match std::env::args().nth(1).as_deref() {
        Some("cluster") => {
            context.put("redis.type", "cluster");
            context.put("redis.address", "127.0.0.1:7000");
            context.put("redis.read", "replicaPreferred");
            context.put("redis.cluster.periodicRefreshEnabled", "true");
            context.put("redis.cluster.refreshPeriod", "5");
        }
        _ => {
            context.put("redis.address", "127.0.0.1:6379");
            context.put("redis.database", "0");
        }
    }
    println!("Configuration: {context}");

    if context.get_string("redis.type").as_deref() == Some("cluster") {
        let cluster = RedisClusterStorage::new();
        init_or_explain(&cluster, &context).await?;
        for key in ["demo:client:1", "demo:retained"] {
            println!("{key} is owned by {:?}", cluster.node_for_key(key));
        }
        run_commands(&cluster).await?;
        cluster.destroy().await;
    } else {
        let storage = create_storage(&context)?;
        init_or_explain(storage.as_ref(), &context).await?;
        run_commands(storage.as_ref()).await?;
        storage.destroy().await;
    }
    Ok(())
}

async fn init_or_explain(storage: &dyn StorageProvider, context: &Context) -> Result<()> {
    if let Err(e) = storage.init(context).await {
        eprintln!("Failed to initialize storage: {e}");
        eprintln!("Make sure Redis is reachable at {:?}", context.get_string("redis.address"));
        return Err(e.into());
    }
    Ok(())
}

async fn run_commands(storage: &dyn StorageProvider) -> Result<()> {
    let hashes = storage.hash()?;
    hashes.hset("demo:client:1", "clientId", "sensor-1").await?;
    hashes.hset("demo:client:1", "cleanSession", "true").await?;
    println!("Session: {:?}", hashes.hgetall("demo:client:1").await?);

    let sorted = storage.sorted_set()?;
    sorted.zadd("demo:retained", 1.0, "sensors/temp").await?;
    sorted.zadd("demo:retained", 2.0, "sensors/humidity").await?;
    println!("Retained topics: {:?}", sorted.zrange("demo:retained", 0, -1).await?);

    // 集群模式下多键DEL要求同槽，逐个删除
    let keys = storage.key()?;
    keys.del(&["demo:client:1"]).await?;
    keys.del(&["demo:retained"]).await?;
    println!("PING -> {}", storage.server()?.ping().await?);
    Ok(())
}
