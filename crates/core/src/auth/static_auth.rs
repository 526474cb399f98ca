use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{AuthorizeResult, Authenticator, MqttQoS, SubscribeOutcome, SubscriptionRequest};
use crate::context::Context;
use crate::errors::BrokerResult;

/// 基于静态配置的鉴权器
///
/// 配置项：
/// - `auth.users.<name> = <password>`
/// - `auth.tokens.<token> = <name>`
/// - `auth.maxQos`：授予的最高QoS，默认 2
/// - `auth.deniedTopics`：禁止发布和订阅的主题，逗号分隔，按字面匹配
/// - `auth.allowAnonymous`：是否允许不带用户名的客户端，默认 false
#[derive(Debug, Clone)]
pub struct StaticAuthenticator {
    users: HashMap<String, String>,
    tokens: HashMap<String, String>,
    denied_topics: HashSet<String>,
    max_qos: MqttQoS,
    allow_anonymous: bool,
}

impl StaticAuthenticator {
    pub const TYPE: &'static str = "static";

    pub fn from_context(config: &Context) -> BrokerResult<Self> {
        let users = config.get_sub_properties("auth.users.")?;
        let tokens = config.get_sub_properties("auth.tokens.")?;

        let max_qos = match config.get_parsed::<u8>("auth.maxQos")? {
            Some(level) => MqttQoS::try_from(level)?,
            None => MqttQoS::ExactlyOnce,
        };

        let denied_topics = config
            .get_string("auth.deniedTopics")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|topic| !topic.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            users,
            tokens,
            denied_topics,
            max_qos,
            allow_anonymous: config.get_boolean_or("auth.allowAnonymous", false)?,
        })
    }

    fn is_known(&self, user_name: Option<&str>) -> bool {
        match user_name {
            Some(name) => self.users.contains_key(name),
            None => self.allow_anonymous,
        }
    }

    fn is_denied_topic(&self, topic: &str) -> bool {
        self.denied_topics.contains(topic)
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn init(&self) -> BrokerResult<()> {
        info!(
            users = self.users.len(),
            tokens = self.tokens.len(),
            denied_topics = self.denied_topics.len(),
            max_qos = %self.max_qos,
            "StaticAuthenticator initialized"
        );
        Ok(())
    }

    async fn destroy(&self) {
        debug!("StaticAuthenticator destroyed");
    }

    async fn authorize_connect(
        &self,
        client_id: &str,
        user_name: Option<&str>,
        password: Option<&str>,
    ) -> AuthorizeResult {
        let granted = match user_name {
            Some(name) => self
                .users
                .get(name)
                .is_some_and(|expected| Some(expected.as_str()) == password),
            None => self.allow_anonymous,
        };
        if !granted {
            warn!(client.id = client_id, user = ?user_name, "CONNECT rejected");
        }
        granted.into()
    }

    async fn authorize_publish(
        &self,
        client_id: &str,
        user_name: Option<&str>,
        topic_name: &str,
        qos: MqttQoS,
        retain: bool,
    ) -> AuthorizeResult {
        let granted =
            self.is_known(user_name) && !self.is_denied_topic(topic_name) && qos <= self.max_qos;
        if !granted {
            debug!(
                client.id = client_id,
                topic = topic_name,
                qos = %qos,
                retain,
                "PUBLISH rejected"
            );
        }
        granted.into()
    }

    async fn authorize_subscribe(
        &self,
        client_id: &str,
        user_name: Option<&str>,
        requests: &[SubscriptionRequest],
    ) -> Vec<SubscribeOutcome> {
        let known = self.is_known(user_name);
        requests
            .iter()
            .map(|request| {
                if !known || self.is_denied_topic(&request.topic_filter) {
                    debug!(
                        client.id = client_id,
                        topic_filter = %request.topic_filter,
                        "SUBSCRIBE entry rejected"
                    );
                    SubscribeOutcome::Denied
                } else {
                    SubscribeOutcome::Granted(request.qos.min(self.max_qos))
                }
            })
            .collect()
    }

    async fn resolve_bearer_token(&self, credentials: &str) -> Option<String> {
        let token = credentials
            .trim()
            .strip_prefix("Bearer ")
            .unwrap_or(credentials.trim());
        self.tokens.get(token).cloned()
    }
}
