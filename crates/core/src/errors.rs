use thiserror::Error;

/// Broker持久化与鉴权层错误类型定义
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("配置格式错误: {key} = {value:?} - {reason}")]
    Format {
        key: String,
        value: String,
        reason: String,
    },

    #[error("配置状态错误: {key} 期望为 {expected:?}, 实际为 {actual:?}")]
    ConfigState {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("缺少必需的配置项: {key}")]
    MissingConfig { key: String },

    #[error("{0} 尚未初始化")]
    NotInitialized(String),

    #[error("{0} 已经初始化过")]
    AlreadyInitialized(String),

    #[error("连接错误: {0}")]
    Connection(String),

    #[error("IO错误: {0}")]
    Io(String),
}

/// 统一的Result类型
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

impl BrokerError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn format<K: Into<String>, V: Into<String>, R: ToString>(key: K, value: V, reason: R) -> Self {
        Self::Format {
            key: key.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config_state<K, E, A>(key: K, expected: E, actual: A) -> Self
    where
        K: Into<String>,
        E: Into<String>,
        A: Into<String>,
    {
        Self::ConfigState {
            key: key.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_config<S: Into<String>>(key: S) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// 启动阶段遇到即应中止的错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrokerError::Format { .. }
                | BrokerError::ConfigState { .. }
                | BrokerError::MissingConfig { .. }
                | BrokerError::Connection(_)
        )
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        BrokerError::Io(err.to_string())
    }
}
