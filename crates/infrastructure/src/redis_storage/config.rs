//! Redis存储配置
//!
//! 所有配置项都位于 `redis.` 命名空间下，由 [`Context`] 提供原始字符串值。

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use broker_core::{BrokerError, BrokerResult, Context};
use url::Url;

pub const TYPE_KEY: &str = "redis.type";
pub const ADDRESS_KEY: &str = "redis.address";
pub const DATABASE_KEY: &str = "redis.database";
pub const PASSWORD_KEY: &str = "redis.password";
pub const READ_FROM_KEY: &str = "redis.read";
pub const CONNECT_TIMEOUT_KEY: &str = "redis.connectTimeout";
pub const COMMAND_TIMEOUT_KEY: &str = "redis.commandTimeout";

pub const PERIODIC_REFRESH_KEY: &str = "redis.cluster.periodicRefreshEnabled";
pub const REFRESH_PERIOD_KEY: &str = "redis.cluster.refreshPeriod";
pub const CLOSE_STALE_KEY: &str = "redis.cluster.closeStaleConnections";
pub const VALIDATE_MEMBERSHIP_KEY: &str = "redis.cluster.validateClusterNodeMembership";
pub const MAX_REDIRECTS_KEY: &str = "redis.cluster.maxRedirects";

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_DATABASE: i64 = 0;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_PERIODIC_REFRESH_ENABLED: bool = false;
pub const DEFAULT_REFRESH_PERIOD_SECONDS: i64 = 60;
pub const DEFAULT_CLOSE_STALE_CONNECTIONS: bool = true;
pub const DEFAULT_VALIDATE_CLUSTER_MEMBERSHIP: bool = true;
pub const DEFAULT_MAX_REDIRECTS: i32 = 5;

const UNSET: &str = "<未设置>";

/// 存储拓扑类型，对应 `redis.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyType {
    Single,
    Cluster,
}

impl TopologyType {
    pub fn as_str(self) -> &'static str {
        match self {
            TopologyType::Single => "single",
            TopologyType::Cluster => "cluster",
        }
    }

    /// 校验配置中的拓扑类型
    ///
    /// 单节点模式允许不配置 `redis.type`；集群模式必须显式配置为 `cluster`。
    pub fn ensure(self, config: &Context) -> BrokerResult<()> {
        let actual = config.get_string(TYPE_KEY);
        let matches = match (&actual, self) {
            (None, TopologyType::Single) => true,
            (None, TopologyType::Cluster) => false,
            (Some(value), expected) => value.trim() == expected.as_str(),
        };

        if matches {
            Ok(())
        } else {
            Err(BrokerError::config_state(
                TYPE_KEY,
                self.as_str(),
                actual.as_deref().unwrap_or(UNSET),
            ))
        }
    }
}

impl FromStr for TopologyType {
    type Err = BrokerError;

    fn from_str(s: &str) -> BrokerResult<Self> {
        match s.trim() {
            "single" => Ok(TopologyType::Single),
            "cluster" => Ok(TopologyType::Cluster),
            other => Err(BrokerError::config_state(TYPE_KEY, "single | cluster", other)),
        }
    }
}

/// 节点地址 `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// 解析 `host[:port]`，IPv6地址需写成 `[::1]:6379`
    pub fn parse(raw: &str, default_port: u16) -> BrokerResult<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| BrokerError::format(ADDRESS_KEY, raw, reason);

        let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| invalid("缺少 ']'"))?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => return Err(invalid("']' 之后只能跟端口")),
            }
        } else {
            match raw.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (raw, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("主机名为空"));
        }
        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|e| invalid(&e.to_string()))?,
            None => default_port,
        };

        Ok(Self::new(host, port))
    }

    fn url_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.url_host(), self.port)
    }
}

/// 解析逗号分隔的地址列表
pub fn parse_addresses(raw: &str, default_port: u16) -> BrokerResult<Vec<NodeAddress>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| NodeAddress::parse(part, default_port))
        .collect()
}

/// 读路由策略，对应 `redis.read`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFrom {
    Master,
    MasterPreferred,
    Replica,
    ReplicaPreferred,
    Nearest,
    Any,
}

impl ReadFrom {
    /// 读请求是否可以路由到副本节点
    ///
    /// `masterPreferred` 与 `master` 一样只读主节点，主节点不可用时由集群重定向处理。
    pub fn allows_replicas(self) -> bool {
        !matches!(self, ReadFrom::Master | ReadFrom::MasterPreferred)
    }
}

impl FromStr for ReadFrom {
    type Err = BrokerError;

    /// 名称不区分大小写，并忽略 `-` 和 `_`，例如 `replicaPreferred`、`REPLICA_PREFERRED`
    fn from_str(s: &str) -> BrokerResult<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "master" | "primary" | "upstream" => Ok(ReadFrom::Master),
            "masterpreferred" | "primarypreferred" | "upstreampreferred" => {
                Ok(ReadFrom::MasterPreferred)
            }
            "slave" | "replica" => Ok(ReadFrom::Replica),
            "slavepreferred" | "replicapreferred" => Ok(ReadFrom::ReplicaPreferred),
            "nearest" | "lowestlatency" => Ok(ReadFrom::Nearest),
            "any" => Ok(ReadFrom::Any),
            _ => Err(BrokerError::format(
                READ_FROM_KEY,
                s,
                "可选值: master, masterPreferred, replica, replicaPreferred, nearest, any",
            )),
        }
    }
}

impl fmt::Display for ReadFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadFrom::Master => "master",
            ReadFrom::MasterPreferred => "masterPreferred",
            ReadFrom::Replica => "replica",
            ReadFrom::ReplicaPreferred => "replicaPreferred",
            ReadFrom::Nearest => "nearest",
            ReadFrom::Any => "any",
        };
        f.write_str(name)
    }
}

/// 单节点与集群共用的连接参数
#[derive(Clone)]
pub struct RedisConfig {
    pub addresses: Vec<NodeAddress>,
    pub database: i64,
    pub password: Option<String>,
    pub read_from: Option<ReadFrom>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl RedisConfig {
    pub fn from_context(config: &Context) -> BrokerResult<Self> {
        let raw_address = config
            .get_string(ADDRESS_KEY)
            .ok_or_else(|| BrokerError::missing_config(ADDRESS_KEY))?;
        let addresses = parse_addresses(&raw_address, DEFAULT_PORT)?;
        if addresses.is_empty() {
            return Err(BrokerError::missing_config(ADDRESS_KEY));
        }

        let database = config.get_long_or(DATABASE_KEY, DEFAULT_DATABASE)?;
        if database < 0 {
            return Err(BrokerError::format(
                DATABASE_KEY,
                database.to_string(),
                "数据库编号不能为负数",
            ));
        }

        let password = config
            .get_string(PASSWORD_KEY)
            .filter(|password| !password.is_empty());

        let read_from = config
            .get_string(READ_FROM_KEY)
            .map(|raw| raw.parse::<ReadFrom>())
            .transpose()?;

        Ok(Self {
            addresses,
            database,
            password,
            read_from,
            connect_timeout: millis(config, CONNECT_TIMEOUT_KEY, DEFAULT_CONNECT_TIMEOUT_MS)?,
            command_timeout: millis(config, COMMAND_TIMEOUT_KEY, DEFAULT_COMMAND_TIMEOUT_MS)?,
        })
    }

    /// 第一个地址，单节点连接和集群发现都只使用它
    pub fn seed(&self) -> &NodeAddress {
        &self.addresses[0]
    }

    /// 构建单节点连接URL: `redis://[:password@]host:port/db`
    pub fn connection_url(&self) -> BrokerResult<String> {
        self.build_url(Some(self.database))
    }

    /// 构建集群种子节点URL，集群模式不携带数据库编号
    pub fn cluster_seed_url(&self) -> BrokerResult<String> {
        self.build_url(None)
    }

    fn build_url(&self, database: Option<i64>) -> BrokerResult<String> {
        let path = database.map(|db| format!("/{db}")).unwrap_or_default();
        let mut url = Url::parse(&format!("redis://{}{}", self.seed(), path))
            .map_err(|e| BrokerError::format(ADDRESS_KEY, self.seed().to_string(), e))?;

        if let Some(password) = &self.password {
            url.set_password(Some(password)).map_err(|_| {
                BrokerError::format(PASSWORD_KEY, "<hidden>", "无法写入连接URL")
            })?;
        }

        Ok(url.to_string())
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("addresses", &self.addresses)
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| "<hidden>"))
            .field("read_from", &self.read_from)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// 集群专有配置
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub periodic_refresh_enabled: bool,
    pub refresh_period: Duration,
    pub close_stale_connections: bool,
    pub validate_cluster_membership: bool,
    pub max_redirects: u32,
    pub read_from: ReadFrom,
}

impl ClusterConfig {
    pub fn from_context(config: &Context) -> BrokerResult<Self> {
        let refresh_seconds =
            config.get_long_or(REFRESH_PERIOD_KEY, DEFAULT_REFRESH_PERIOD_SECONDS)?;
        if refresh_seconds <= 0 {
            return Err(BrokerError::format(
                REFRESH_PERIOD_KEY,
                refresh_seconds.to_string(),
                "刷新周期必须大于0秒",
            ));
        }

        let max_redirects = config.get_int_or(MAX_REDIRECTS_KEY, DEFAULT_MAX_REDIRECTS)?;
        let max_redirects = u32::try_from(max_redirects).map_err(|_| {
            BrokerError::format(MAX_REDIRECTS_KEY, max_redirects.to_string(), "不能为负数")
        })?;

        let read_from = config
            .get_string(READ_FROM_KEY)
            .ok_or_else(|| BrokerError::missing_config(READ_FROM_KEY))?
            .parse::<ReadFrom>()?;

        Ok(Self {
            periodic_refresh_enabled: config
                .get_boolean_or(PERIODIC_REFRESH_KEY, DEFAULT_PERIODIC_REFRESH_ENABLED)?,
            refresh_period: Duration::from_secs(refresh_seconds as u64),
            close_stale_connections: config
                .get_boolean_or(CLOSE_STALE_KEY, DEFAULT_CLOSE_STALE_CONNECTIONS)?,
            validate_cluster_membership: config
                .get_boolean_or(VALIDATE_MEMBERSHIP_KEY, DEFAULT_VALIDATE_CLUSTER_MEMBERSHIP)?,
            max_redirects,
            read_from,
        })
    }
}

fn millis(config: &Context, key: &str, default: u64) -> BrokerResult<Duration> {
    match config.get_parsed::<u64>(key)? {
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => Ok(Duration::from_millis(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(entries: &[(&str, &str)]) -> Context {
        let context = Context::new();
        context.put_all(entries.iter().copied());
        context
    }

    #[test]
    fn test_parse_address_default_port() {
        assert_eq!(
            NodeAddress::parse("redis-a", DEFAULT_PORT).unwrap(),
            NodeAddress::new("redis-a", 6379)
        );
        assert_eq!(
            NodeAddress::parse(" 10.0.0.1:7001 ", DEFAULT_PORT).unwrap(),
            NodeAddress::new("10.0.0.1", 7001)
        );
        assert_eq!(
            NodeAddress::parse("[::1]:7000", DEFAULT_PORT).unwrap(),
            NodeAddress::new("::1", 7000)
        );
        assert_eq!(
            NodeAddress::parse("[::1]", DEFAULT_PORT).unwrap().to_string(),
            "[::1]:6379"
        );
    }

    #[test]
    fn test_parse_address_errors() {
        assert!(matches!(
            NodeAddress::parse("host:notaport", DEFAULT_PORT),
            Err(BrokerError::Format { .. })
        ));
        assert!(NodeAddress::parse(":6379", DEFAULT_PORT).is_err());
        assert!(NodeAddress::parse("[::1", DEFAULT_PORT).is_err());
    }

    #[test]
    fn test_parse_address_list() {
        let list = parse_addresses("a:1, b ,,c:3", DEFAULT_PORT).unwrap();
        assert_eq!(
            list,
            vec![
                NodeAddress::new("a", 1),
                NodeAddress::new("b", 6379),
                NodeAddress::new("c", 3),
            ]
        );
    }

    #[test]
    fn test_read_from_names() {
        assert_eq!("master".parse::<ReadFrom>().unwrap(), ReadFrom::Master);
        assert_eq!("MASTER_PREFERRED".parse::<ReadFrom>().unwrap(), ReadFrom::MasterPreferred);
        assert_eq!("slave".parse::<ReadFrom>().unwrap(), ReadFrom::Replica);
        assert_eq!("replica-preferred".parse::<ReadFrom>().unwrap(), ReadFrom::ReplicaPreferred);
        assert_eq!("nearest".parse::<ReadFrom>().unwrap(), ReadFrom::Nearest);
        assert!(!ReadFrom::Master.allows_replicas());
        assert!(!"masterPreferred".parse::<ReadFrom>().unwrap().allows_replicas());
        assert!(!"primary_preferred".parse::<ReadFrom>().unwrap().allows_replicas());
        assert!(ReadFrom::Replica.allows_replicas());
        assert!(ReadFrom::ReplicaPreferred.allows_replicas());
        assert!(ReadFrom::Nearest.allows_replicas());
        assert!(ReadFrom::Any.allows_replicas());
        assert!(matches!(
            "closest".parse::<ReadFrom>(),
            Err(BrokerError::Format { .. })
        ));
    }

    #[test]
    fn test_connection_url_with_and_without_password() {
        let config = RedisConfig::from_context(&context(&[
            (ADDRESS_KEY, "cache-1:6380,cache-2"),
            (DATABASE_KEY, "3"),
        ]))
        .unwrap();
        assert_eq!(config.connection_url().unwrap(), "redis://cache-1:6380/3");
        assert_eq!(config.seed(), &NodeAddress::new("cache-1", 6380));

        let config = RedisConfig::from_context(&context(&[
            (ADDRESS_KEY, "cache-1"),
            (PASSWORD_KEY, "s3cret"),
        ]))
        .unwrap();
        assert_eq!(
            config.connection_url().unwrap(),
            "redis://:s3cret@cache-1:6379/0"
        );
        assert_eq!(
            config.cluster_seed_url().unwrap(),
            "redis://:s3cret@cache-1:6379"
        );
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_empty_password_is_omitted() {
        let config = RedisConfig::from_context(&context(&[
            (ADDRESS_KEY, "cache-1"),
            (PASSWORD_KEY, ""),
        ]))
        .unwrap();
        assert_eq!(config.password, None);
        assert_eq!(config.connection_url().unwrap(), "redis://cache-1:6379/0");
    }

    #[test]
    fn test_missing_address() {
        assert!(matches!(
            RedisConfig::from_context(&Context::new()),
            Err(BrokerError::MissingConfig { .. })
        ));
        assert!(matches!(
            RedisConfig::from_context(&context(&[(ADDRESS_KEY, " , ")])),
            Err(BrokerError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_topology_guard() {
        assert!(TopologyType::Single.ensure(&Context::new()).is_ok());
        assert!(TopologyType::Single
            .ensure(&context(&[(TYPE_KEY, "single")]))
            .is_ok());

        match TopologyType::Cluster.ensure(&context(&[(TYPE_KEY, "single")])) {
            Err(BrokerError::ConfigState { expected, actual, .. }) => {
                assert_eq!(expected, "cluster");
                assert_eq!(actual, "single");
            }
            other => panic!("unexpected: {other:?}"),
        }
        match TopologyType::Cluster.ensure(&Context::new()) {
            Err(BrokerError::ConfigState { actual, .. }) => assert_eq!(actual, UNSET),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(TopologyType::Single
            .ensure(&context(&[(TYPE_KEY, "cluster")]))
            .is_err());
    }

    #[test]
    fn test_cluster_config_defaults() {
        let config = ClusterConfig::from_context(&context(&[(READ_FROM_KEY, "replicaPreferred")]))
            .unwrap();
        assert!(!config.periodic_refresh_enabled);
        assert_eq!(config.refresh_period, Duration::from_secs(60));
        assert!(config.close_stale_connections);
        assert!(config.validate_cluster_membership);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.read_from, ReadFrom::ReplicaPreferred);
    }

    #[test]
    fn test_cluster_config_overrides_and_errors() {
        let config = ClusterConfig::from_context(&context(&[
            (READ_FROM_KEY, "master"),
            (PERIODIC_REFRESH_KEY, "true"),
            (REFRESH_PERIOD_KEY, "15"),
            (CLOSE_STALE_KEY, "false"),
            (MAX_REDIRECTS_KEY, "8"),
        ]))
        .unwrap();
        assert!(config.periodic_refresh_enabled);
        assert_eq!(config.refresh_period, Duration::from_secs(15));
        assert!(!config.close_stale_connections);
        assert_eq!(config.max_redirects, 8);

        assert!(matches!(
            ClusterConfig::from_context(&Context::new()),
            Err(BrokerError::MissingConfig { .. })
        ));
        assert!(matches!(
            ClusterConfig::from_context(&context(&[
                (READ_FROM_KEY, "master"),
                (REFRESH_PERIOD_KEY, "0"),
            ])),
            Err(BrokerError::Format { .. })
        ));
        assert!(matches!(
            ClusterConfig::from_context(&context(&[
                (READ_FROM_KEY, "master"),
                (PERIODIC_REFRESH_KEY, "sometimes"),
            ])),
            Err(BrokerError::Format { .. })
        ));
    }
}
