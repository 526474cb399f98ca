//! MQTT 鉴权契约
//!
//! 协议引擎在处理 CONNECT、PUBLISH、SUBSCRIBE 报文以及 HTTP bearer-token
//! 交换时调用 [`Authenticator`]。拒绝是正常的返回值，不通过错误通道传递。

pub mod allow_all;
pub mod static_auth;
pub mod types;

pub use allow_all::AllowAllAuthenticator;
pub use static_auth::StaticAuthenticator;
pub use types::{AuthorizeResult, MqttQoS, SubscribeOutcome, SubscriptionRequest};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::context::Context;
use crate::errors::{BrokerError, BrokerResult};

/// 鉴权实现选择键
pub const AUTH_TYPE_KEY: &str = "auth.type";

/// 鉴权抽象接口
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// 初始化鉴权器，由 broker 在启动时调用一次
    async fn init(&self) -> BrokerResult<()>;

    /// 销毁鉴权器，不返回错误
    async fn destroy(&self);

    /// 客户端 CONNECT 鉴权
    async fn authorize_connect(
        &self,
        client_id: &str,
        user_name: Option<&str>,
        password: Option<&str>,
    ) -> AuthorizeResult;

    /// 客户端 PUBLISH 鉴权
    async fn authorize_publish(
        &self,
        client_id: &str,
        user_name: Option<&str>,
        topic_name: &str,
        qos: MqttQoS,
        retain: bool,
    ) -> AuthorizeResult;

    /// 客户端 SUBSCRIBE 鉴权
    ///
    /// 返回值与 `requests` 一一对应且顺序一致，允许部分授权。
    async fn authorize_subscribe(
        &self,
        client_id: &str,
        user_name: Option<&str>,
        requests: &[SubscriptionRequest],
    ) -> Vec<SubscribeOutcome>;

    /// 用 bearer-token 换取用户名，无法解析时返回 `None`
    async fn resolve_bearer_token(&self, credentials: &str) -> Option<String>;
}

/// 根据 `auth.type` 创建鉴权实现
pub fn create_authenticator(config: &Context) -> BrokerResult<Arc<dyn Authenticator>> {
    let auth_type = config.get_string_or(AUTH_TYPE_KEY, AllowAllAuthenticator::TYPE);
    info!(auth_type = %auth_type, "Creating authenticator");

    match auth_type.trim() {
        AllowAllAuthenticator::TYPE => Ok(Arc::new(AllowAllAuthenticator)),
        StaticAuthenticator::TYPE => Ok(Arc::new(StaticAuthenticator::from_context(config)?)),
        other => Err(BrokerError::config_state(
            AUTH_TYPE_KEY,
            format!("{} | {}", AllowAllAuthenticator::TYPE, StaticAuthenticator::TYPE),
            other,
        )),
    }
}
