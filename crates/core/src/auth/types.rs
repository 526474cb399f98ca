use std::fmt;

use crate::errors::{BrokerError, BrokerResult};

/// MQTT服务质量等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MqttQoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl MqttQoS {
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MqttQoS {
    type Error = BrokerError;

    fn try_from(value: u8) -> BrokerResult<Self> {
        match value {
            0 => Ok(MqttQoS::AtMostOnce),
            1 => Ok(MqttQoS::AtLeastOnce),
            2 => Ok(MqttQoS::ExactlyOnce),
            other => Err(BrokerError::invalid_argument(format!(
                "无效的QoS等级: {other}"
            ))),
        }
    }
}

impl fmt::Display for MqttQoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// CONNECT / PUBLISH 的鉴权结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeResult {
    Ok,
    Forbidden,
}

impl AuthorizeResult {
    pub fn is_granted(self) -> bool {
        self == AuthorizeResult::Ok
    }
}

impl From<bool> for AuthorizeResult {
    fn from(granted: bool) -> Self {
        if granted {
            AuthorizeResult::Ok
        } else {
            AuthorizeResult::Forbidden
        }
    }
}

/// SUBSCRIBE 报文中的一个订阅请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub topic_filter: String,
    pub qos: MqttQoS,
}

impl SubscriptionRequest {
    pub fn new(topic_filter: impl Into<String>, qos: MqttQoS) -> Self {
        Self {
            topic_filter: topic_filter.into(),
            qos,
        }
    }
}

/// 单个订阅请求的鉴权结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Granted(MqttQoS),
    Denied,
}

impl SubscribeOutcome {
    /// SUBACK 中的失败返回码
    pub const FAILURE_RETURN_CODE: u8 = 0x80;

    /// 转换为 SUBACK 报文中对应的返回码
    pub fn return_code(self) -> u8 {
        match self {
            SubscribeOutcome::Granted(qos) => qos.value(),
            SubscribeOutcome::Denied => Self::FAILURE_RETURN_CODE,
        }
    }

    pub fn is_granted(self) -> bool {
        matches!(self, SubscribeOutcome::Granted(_))
    }
}
