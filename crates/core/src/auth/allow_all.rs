use async_trait::async_trait;
use tracing::debug;

use super::{AuthorizeResult, Authenticator, MqttQoS, SubscribeOutcome, SubscriptionRequest};
use crate::errors::BrokerResult;

/// 放行所有请求的鉴权器，适用于开发和内网环境
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthenticator;

impl AllowAllAuthenticator {
    pub const TYPE: &'static str = "allowAll";
}

#[async_trait]
impl Authenticator for AllowAllAuthenticator {
    async fn init(&self) -> BrokerResult<()> {
        debug!("AllowAllAuthenticator initialized");
        Ok(())
    }

    async fn destroy(&self) {}

    async fn authorize_connect(
        &self,
        _client_id: &str,
        _user_name: Option<&str>,
        _password: Option<&str>,
    ) -> AuthorizeResult {
        AuthorizeResult::Ok
    }

    async fn authorize_publish(
        &self,
        _client_id: &str,
        _user_name: Option<&str>,
        _topic_name: &str,
        _qos: MqttQoS,
        _retain: bool,
    ) -> AuthorizeResult {
        AuthorizeResult::Ok
    }

    async fn authorize_subscribe(
        &self,
        _client_id: &str,
        _user_name: Option<&str>,
        requests: &[SubscriptionRequest],
    ) -> Vec<SubscribeOutcome> {
        requests
            .iter()
            .map(|request| SubscribeOutcome::Granted(request.qos))
            .collect()
    }

    async fn resolve_bearer_token(&self, _credentials: &str) -> Option<String> {
        None
    }
}
