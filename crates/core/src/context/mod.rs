//! 配置上下文
//!
//! `Context` 是在整个系统中传递配置信息的键值存储。键使用点号分隔的
//! 命名空间约定（例如 `redis.cluster.refreshPeriod`），值保存原始字符串，
//! 在读取时按需解析为具体类型。
//!
//! 所有读写操作都在内部加锁，可以通过 `Arc<Context>` 在多个线程之间共享。

pub mod loader;

pub use loader::{flatten_toml, load_toml_file, parse_override};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;

use crate::errors::{BrokerError, BrokerResult};

/// 命名空间分隔符
pub const NAMESPACE_DELIMITER: char = '.';

/// `get_int` 在键不存在时返回的哨兵值
pub const UNSET_INT: i32 = -1;

/// 线程安全的字符串键值配置容器
#[derive(Default)]
pub struct Context {
    parameters: RwLock<HashMap<String, String>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(parameters: HashMap<String, String>) -> Self {
        Self {
            parameters: RwLock::new(parameters),
        }
    }

    /// 获取所有配置项的快照
    ///
    /// 返回的是副本，修改它不会影响内部状态，之后对 `Context` 的写入也不会反映到快照中。
    pub fn get_parameters(&self) -> HashMap<String, String> {
        self.parameters.read().clone()
    }

    /// 移除所有配置项
    pub fn clear(&self) {
        self.parameters.write().clear();
    }

    /// 获取以指定前缀开头的配置项，并从键中去掉前缀
    ///
    /// 例如前缀为 `redis.` 且上下文包含 `{ redis.address = a, other = b }` 时，
    /// 返回 `{ address = a }`。
    ///
    /// 前缀必须以 `.` 结尾，否则返回 [`BrokerError::InvalidArgument`]。
    /// 没有匹配项时返回空映射。
    pub fn get_sub_properties(&self, prefix: &str) -> BrokerResult<HashMap<String, String>> {
        if !prefix.ends_with(NAMESPACE_DELIMITER) {
            return Err(BrokerError::invalid_argument(format!(
                "前缀必须以 '{NAMESPACE_DELIMITER}' 结尾: {prefix:?}"
            )));
        }

        let parameters = self.parameters.read();
        Ok(parameters
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect())
    }

    /// 批量写入配置项，已存在的键会被覆盖
    pub fn put_all<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut parameters = self.parameters.write();
        for (key, value) in entries {
            parameters.insert(key.into(), value.into());
        }
    }

    /// 写入一个配置项，已存在的键会被覆盖
    pub fn put<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.parameters.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.parameters.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.parameters.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.parameters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.read().is_empty()
    }

    pub fn get_boolean(&self, key: &str) -> BrokerResult<Option<bool>> {
        self.get_with(key, parse_bool)
    }

    pub fn get_boolean_or(&self, key: &str, default: bool) -> BrokerResult<bool> {
        Ok(self.get_boolean(key)?.unwrap_or(default))
    }

    pub fn get_integer(&self, key: &str) -> BrokerResult<Option<i32>> {
        self.get_parsed(key)
    }

    pub fn get_integer_or(&self, key: &str, default: i32) -> BrokerResult<i32> {
        Ok(self.get_integer(key)?.unwrap_or(default))
    }

    /// 读取整数配置，键不存在时返回 [`UNSET_INT`] (`-1`)
    ///
    /// 保留给已经把 `-1` 当作“未设置”处理的调用方，新代码应使用 [`Context::get_integer`]。
    pub fn get_int(&self, key: &str) -> BrokerResult<i32> {
        self.get_integer_or(key, UNSET_INT)
    }

    pub fn get_int_or(&self, key: &str, default: i32) -> BrokerResult<i32> {
        self.get_integer_or(key, default)
    }

    pub fn get_long(&self, key: &str) -> BrokerResult<Option<i64>> {
        self.get_parsed(key)
    }

    pub fn get_long_or(&self, key: &str, default: i64) -> BrokerResult<i64> {
        Ok(self.get_long(key)?.unwrap_or(default))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.parameters.read().get(key).cloned()
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    /// 读取并解析任意实现了 `FromStr` 的类型，解析前去掉首尾空白
    pub fn get_parsed<T>(&self, key: &str) -> BrokerResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get_with(key, |raw| raw.parse::<T>().map_err(|e| e.to_string()))
    }

    fn get_with<T, F>(&self, key: &str, parse: F) -> BrokerResult<Option<T>>
    where
        F: FnOnce(&str) -> Result<T, String>,
    {
        match self.get_string(key) {
            Some(raw) => parse(raw.trim())
                .map(Some)
                .map_err(|reason| BrokerError::format(key, raw, reason)),
            None => Ok(None),
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    if raw.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err("期望 true 或 false".to_string())
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self::from_map(self.get_parameters())
    }
}

impl From<HashMap<String, String>> for Context {
    fn from(parameters: HashMap<String, String>) -> Self {
        Self::from_map(parameters)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("len", &self.len())
            .finish()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sorted: BTreeMap<String, String> = self.get_parameters().into_iter().collect();
        write!(f, "{{ parameters:{sorted:?} }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_is_case_insensitive() {
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool("False"), Ok(false));
        assert!(parse_bool("yes").is_err());
    }

    #[test]
    fn test_clone_is_independent() {
        let context = Context::new();
        context.put("a", "1");
        let copy = context.clone();
        context.put("a", "2");
        assert_eq!(copy.get_string("a").as_deref(), Some("1"));
    }

    #[test]
    fn test_display_sorted() {
        let context = Context::new();
        context.put("b", "2");
        context.put("a", "1");
        assert_eq!(
            context.to_string(),
            "{ parameters:{\"a\": \"1\", \"b\": \"2\"} }"
        );
    }
}
