//! 从TOML文件构建 `Context`
//!
//! 嵌套表被展开为点号分隔的键，键名保持原有大小写：
//!
//! ```toml
//! [redis.cluster]
//! refreshPeriod = 30
//! ```
//!
//! 展开后得到 `redis.cluster.refreshPeriod = "30"`。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use super::{Context, NAMESPACE_DELIMITER};
use crate::errors::{BrokerError, BrokerResult};

/// 读取TOML配置文件并展开为 `Context`
pub fn load_toml_file(path: impl AsRef<Path>) -> BrokerResult<Context> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| BrokerError::Io(format!("读取配置文件失败 {}: {e}", path.display())))?;

    let table: toml::Table = toml::from_str(&content).map_err(|e| {
        BrokerError::format(path.display().to_string(), "<toml>", e.message())
    })?;

    let parameters = flatten_toml(&table);
    debug!(
        path = %path.display(),
        entries = parameters.len(),
        "Loaded configuration file"
    );
    Ok(Context::from_map(parameters))
}

/// 把TOML表展开为扁平的字符串映射
///
/// 数组以逗号连接，与 `redis.address` 这类列表配置的写法一致。
pub fn flatten_toml(table: &toml::Table) -> HashMap<String, String> {
    let mut out = HashMap::new();
    flatten_into(&mut out, "", table);
    out
}

fn flatten_into(out: &mut HashMap<String, String>, prefix: &str, table: &toml::Table) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{NAMESPACE_DELIMITER}{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_into(out, &full_key, nested),
            other => {
                out.insert(full_key, scalar_to_string(other));
            }
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(","),
        toml::Value::Table(_) => String::new(),
    }
}

/// 解析命令行上的 `key=value` 覆盖项
pub fn parse_override(raw: &str) -> BrokerResult<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(BrokerError::invalid_argument(format!(
            "覆盖项必须是 key=value 形式: {raw:?}"
        ))),
    }
}
