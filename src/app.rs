use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use broker_core::{create_authenticator, Authenticator, Context};
use broker_infrastructure::{create_storage, StorageProvider};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const HEALTH_CHECK_INTERVAL_KEY: &str = "broker.healthCheckInterval";
const DEFAULT_HEALTH_CHECK_INTERVAL_SECONDS: i64 = 30;

/// broker 进程持有的后端服务
pub struct Broker {
    storage: Arc<dyn StorageProvider>,
    authenticator: Arc<dyn Authenticator>,
    health_check_interval: Duration,
}

impl Broker {
    /// 按配置创建并初始化存储和鉴权组件
    ///
    /// 鉴权组件初始化失败时会先销毁已初始化的存储。
    pub async fn start(config: &Context) -> Result<Self> {
        let interval_secs = config
            .get_long_or(HEALTH_CHECK_INTERVAL_KEY, DEFAULT_HEALTH_CHECK_INTERVAL_SECONDS)?
            .max(1) as u64;

        let storage = create_storage(config)?;
        storage.init(config).await.context("初始化存储失败")?;

        let authenticator = match create_authenticator(config) {
            Ok(authenticator) => authenticator,
            Err(e) => {
                storage.destroy().await;
                return Err(e).context("创建鉴权组件失败");
            }
        };
        if let Err(e) = authenticator.init().await {
            storage.destroy().await;
            return Err(e).context("初始化鉴权组件失败");
        }

        info!("Broker backends ready");
        Ok(Self {
            storage,
            authenticator,
            health_check_interval: Duration::from_secs(interval_secs),
        })
    }

    pub fn storage(&self) -> Arc<dyn StorageProvider> {
        self.storage.clone()
    }

    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        self.authenticator.clone()
    }

    /// 周期性检查存储连通性，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = interval(self.health_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => self.check_storage().await,
            }
        }
        debug!("Broker health check loop stopped");
    }

    async fn check_storage(&self) {
        let server = match self.storage.server() {
            Ok(server) => server,
            Err(e) => {
                warn!(error = %e, "Storage unavailable");
                return;
            }
        };
        match server.ping().await {
            Ok(reply) => debug!(reply = %reply, "Storage health check passed"),
            Err(e) => warn!(error = %e, "Storage health check failed"),
        }
    }

    /// 按与初始化相反的顺序释放组件
    pub async fn stop(&self) {
        self.authenticator.destroy().await;
        self.storage.destroy().await;
        info!("Broker backends released");
    }
}
