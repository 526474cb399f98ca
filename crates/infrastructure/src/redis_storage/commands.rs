//! 按命令组划分的类型化命令门面
//!
//! 每个门面只是绑定在提供者连接槽上的一层薄封装，命令错误原样返回 `RedisError`；
//! 提供者销毁后命令返回 `ClientError`。
//! 键和值都按字符串处理。

use std::collections::{HashMap, HashSet};

use redis::{Cmd, FromRedisValue, RedisResult, Script};

use super::connection::SharedConnection;

macro_rules! command_facade {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            conn: SharedConnection,
        }

        impl $name {
            pub(crate) fn new(conn: SharedConnection) -> Self {
                Self { conn }
            }

            /// 底层连接，用于执行门面未覆盖的命令，提供者销毁后同样失效
            pub fn connection(&self) -> SharedConnection {
                self.conn.clone()
            }

            async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> RedisResult<T> {
                let mut conn = self.conn.clone();
                cmd.query_async(&mut conn).await
            }
        }
    };
}

command_facade!(
    /// Hash 命令
    HashCommands
);
command_facade!(
    /// String 命令
    StringCommands
);
command_facade!(
    /// 通用 Key 命令
    KeyCommands
);
command_facade!(
    /// List 命令
    ListCommands
);
command_facade!(
    /// Set 命令
    SetCommands
);
command_facade!(
    /// Sorted Set 命令
    SortedSetCommands
);
command_facade!(
    /// Lua 脚本命令
    ScriptingCommands
);
command_facade!(
    /// 服务器管理命令
    ServerCommands
);
command_facade!(
    /// HyperLogLog 命令
    HllCommands
);
command_facade!(
    /// Geo 命令
    GeoCommands
);

impl HashCommands {
    pub async fn hget(&self, key: &str, field: &str) -> RedisResult<Option<String>> {
        self.query(redis::cmd("HGET").arg(key).arg(field)).await
    }

    /// 返回新增字段的数量
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> RedisResult<i64> {
        self.query(redis::cmd("HSET").arg(key).arg(field).arg(value))
            .await
    }

    pub async fn hset_multiple(&self, key: &str, items: &[(&str, &str)]) -> RedisResult<i64> {
        self.query(redis::cmd("HSET").arg(key).arg(items)).await
    }

    pub async fn hgetall(&self, key: &str) -> RedisResult<HashMap<String, String>> {
        self.query(redis::cmd("HGETALL").arg(key)).await
    }

    pub async fn hdel(&self, key: &str, fields: &[&str]) -> RedisResult<i64> {
        self.query(redis::cmd("HDEL").arg(key).arg(fields)).await
    }

    pub async fn hexists(&self, key: &str, field: &str) -> RedisResult<bool> {
        self.query(redis::cmd("HEXISTS").arg(key).arg(field)).await
    }

    pub async fn hkeys(&self, key: &str) -> RedisResult<Vec<String>> {
        self.query(redis::cmd("HKEYS").arg(key)).await
    }

    pub async fn hvals(&self, key: &str) -> RedisResult<Vec<String>> {
        self.query(redis::cmd("HVALS").arg(key)).await
    }

    pub async fn hlen(&self, key: &str) -> RedisResult<i64> {
        self.query(redis::cmd("HLEN").arg(key)).await
    }

    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> RedisResult<i64> {
        self.query(redis::cmd("HINCRBY").arg(key).arg(field).arg(delta))
            .await
    }
}

impl StringCommands {
    pub async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    pub async fn set(&self, key: &str, value: &str) -> RedisResult<()> {
        self.query(redis::cmd("SET").arg(key).arg(value)).await
    }

    pub async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> RedisResult<()> {
        self.query(redis::cmd("SET").arg(key).arg(value).arg("EX").arg(seconds))
            .await
    }

    /// 键不存在时写入，返回是否写入成功
    pub async fn set_nx(&self, key: &str, value: &str) -> RedisResult<bool> {
        self.query(redis::cmd("SETNX").arg(key).arg(value)).await
    }

    pub async fn mget(&self, keys: &[&str]) -> RedisResult<Vec<Option<String>>> {
        self.query(redis::cmd("MGET").arg(keys)).await
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> RedisResult<i64> {
        self.query(redis::cmd("INCRBY").arg(key).arg(delta)).await
    }

    pub async fn strlen(&self, key: &str) -> RedisResult<i64> {
        self.query(redis::cmd("STRLEN").arg(key)).await
    }
}

impl KeyCommands {
    pub async fn del(&self, keys: &[&str]) -> RedisResult<i64> {
        self.query(redis::cmd("DEL").arg(keys)).await
    }

    pub async fn exists(&self, key: &str) -> RedisResult<bool> {
        self.query(redis::cmd("EXISTS").arg(key)).await
    }

    pub async fn expire(&self, key: &str, seconds: i64) -> RedisResult<bool> {
        self.query(redis::cmd("EXPIRE").arg(key).arg(seconds)).await
    }

    pub async fn pexpire(&self, key: &str, millis: i64) -> RedisResult<bool> {
        self.query(redis::cmd("PEXPIRE").arg(key).arg(millis)).await
    }

    /// 剩余生存时间（秒），`-1` 表示没有过期时间，`-2` 表示键不存在
    pub async fn ttl(&self, key: &str) -> RedisResult<i64> {
        self.query(redis::cmd("TTL").arg(key)).await
    }

    pub async fn persist(&self, key: &str) -> RedisResult<bool> {
        self.query(redis::cmd("PERSIST").arg(key)).await
    }

    pub async fn key_type(&self, key: &str) -> RedisResult<String> {
        self.query(redis::cmd("TYPE").arg(key)).await
    }

    pub async fn rename(&self, key: &str, new_key: &str) -> RedisResult<()> {
        self.query(redis::cmd("RENAME").arg(key).arg(new_key)).await
    }
}

impl ListCommands {
    pub async fn lpush(&self, key: &str, values: &[&str]) -> RedisResult<i64> {
        self.query(redis::cmd("LPUSH").arg(key).arg(values)).await
    }

    pub async fn rpush(&self, key: &str, values: &[&str]) -> RedisResult<i64> {
        self.query(redis::cmd("RPUSH").arg(key).arg(values)).await
    }

    pub async fn lpop(&self, key: &str) -> RedisResult<Option<String>> {
        self.query(redis::cmd("LPOP").arg(key)).await
    }

    pub async fn rpop(&self, key: &str) -> RedisResult<Option<String>> {
        self.query(redis::cmd("RPOP").arg(key)).await
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> RedisResult<Vec<String>> {
        self.query(redis::cmd("LRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    pub async fn lindex(&self, key: &str, index: i64) -> RedisResult<Option<String>> {
        self.query(redis::cmd("LINDEX").arg(key).arg(index)).await
    }

    pub async fn llen(&self, key: &str) -> RedisResult<i64> {
        self.query(redis::cmd("LLEN").arg(key)).await
    }

    pub async fn lrem(&self, key: &str, count: i64, value: &str) -> RedisResult<i64> {
        self.query(redis::cmd("LREM").arg(key).arg(count).arg(value))
            .await
    }

    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) -> RedisResult<()> {
        self.query(redis::cmd("LTRIM").arg(key).arg(start).arg(stop))
            .await
    }
}

impl SetCommands {
    pub async fn sadd(&self, key: &str, members: &[&str]) -> RedisResult<i64> {
        self.query(redis::cmd("SADD").arg(key).arg(members)).await
    }

    pub async fn srem(&self, key: &str, members: &[&str]) -> RedisResult<i64> {
        self.query(redis::cmd("SREM").arg(key).arg(members)).await
    }

    pub async fn smembers(&self, key: &str) -> RedisResult<HashSet<String>> {
        self.query(redis::cmd("SMEMBERS").arg(key)).await
    }

    pub async fn sismember(&self, key: &str, member: &str) -> RedisResult<bool> {
        self.query(redis::cmd("SISMEMBER").arg(key).arg(member)).await
    }

    pub async fn scard(&self, key: &str) -> RedisResult<i64> {
        self.query(redis::cmd("SCARD").arg(key)).await
    }
}

impl SortedSetCommands {
    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> RedisResult<i64> {
        self.query(redis::cmd("ZADD").arg(key).arg(score).arg(member))
            .await
    }

    pub async fn zrem(&self, key: &str, members: &[&str]) -> RedisResult<i64> {
        self.query(redis::cmd("ZREM").arg(key).arg(members)).await
    }

    pub async fn zscore(&self, key: &str, member: &str) -> RedisResult<Option<f64>> {
        self.query(redis::cmd("ZSCORE").arg(key).arg(member)).await
    }

    pub async fn zincr_by(&self, key: &str, delta: f64, member: &str) -> RedisResult<f64> {
        self.query(redis::cmd("ZINCRBY").arg(key).arg(delta).arg(member))
            .await
    }

    pub async fn zcard(&self, key: &str) -> RedisResult<i64> {
        self.query(redis::cmd("ZCARD").arg(key)).await
    }

    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> RedisResult<Vec<String>> {
        self.query(redis::cmd("ZRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    pub async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> RedisResult<Vec<String>> {
        self.query(redis::cmd("ZRANGEBYSCORE").arg(key).arg(min).arg(max))
            .await
    }

    pub async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> RedisResult<i64> {
        self.query(redis::cmd("ZREMRANGEBYSCORE").arg(key).arg(min).arg(max))
            .await
    }
}

impl ScriptingCommands {
    /// 通过 EVALSHA 执行脚本，脚本未缓存时自动回退到 EVAL
    pub async fn eval<T: FromRedisValue>(
        &self,
        script: &Script,
        keys: &[&str],
        args: &[&str],
    ) -> RedisResult<T> {
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }
        let mut conn = self.conn.clone();
        invocation.invoke_async(&mut conn).await
    }

    pub async fn evalsha<T: FromRedisValue>(
        &self,
        sha: &str,
        keys: &[&str],
        args: &[&str],
    ) -> RedisResult<T> {
        self.query(
            redis::cmd("EVALSHA")
                .arg(sha)
                .arg(keys.len())
                .arg(keys)
                .arg(args),
        )
        .await
    }

    /// 返回脚本的 SHA1
    pub async fn script_load(&self, source: &str) -> RedisResult<String> {
        self.query(redis::cmd("SCRIPT").arg("LOAD").arg(source)).await
    }

    pub async fn script_exists(&self, shas: &[&str]) -> RedisResult<Vec<bool>> {
        self.query(redis::cmd("SCRIPT").arg("EXISTS").arg(shas)).await
    }

    pub async fn script_flush(&self) -> RedisResult<()> {
        self.query(redis::cmd("SCRIPT").arg("FLUSH")).await
    }
}

impl ServerCommands {
    pub async fn ping(&self) -> RedisResult<String> {
        self.query(&redis::cmd("PING")).await
    }

    pub async fn dbsize(&self) -> RedisResult<i64> {
        self.query(&redis::cmd("DBSIZE")).await
    }

    pub async fn info(&self, section: Option<&str>) -> RedisResult<String> {
        let mut cmd = redis::cmd("INFO");
        if let Some(section) = section {
            cmd.arg(section);
        }
        self.query(&cmd).await
    }

    /// 服务器时间 `(秒, 微秒)`
    pub async fn time(&self) -> RedisResult<(i64, i64)> {
        self.query(&redis::cmd("TIME")).await
    }

    pub async fn flushdb(&self) -> RedisResult<()> {
        self.query(&redis::cmd("FLUSHDB")).await
    }
}

impl HllCommands {
    /// 返回基数估计是否发生变化
    pub async fn pfadd(&self, key: &str, elements: &[&str]) -> RedisResult<bool> {
        self.query(redis::cmd("PFADD").arg(key).arg(elements)).await
    }

    pub async fn pfcount(&self, keys: &[&str]) -> RedisResult<i64> {
        self.query(redis::cmd("PFCOUNT").arg(keys)).await
    }

    pub async fn pfmerge(&self, dest: &str, sources: &[&str]) -> RedisResult<()> {
        self.query(redis::cmd("PFMERGE").arg(dest).arg(sources)).await
    }
}

/// Geo 命令的距离单位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoUnit {
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl GeoUnit {
    fn as_arg(self) -> &'static str {
        match self {
            GeoUnit::Meters => "m",
            GeoUnit::Kilometers => "km",
            GeoUnit::Miles => "mi",
            GeoUnit::Feet => "ft",
        }
    }
}

impl GeoCommands {
    pub async fn geo_add(
        &self,
        key: &str,
        longitude: f64,
        latitude: f64,
        member: &str,
    ) -> RedisResult<i64> {
        self.query(
            redis::cmd("GEOADD")
                .arg(key)
                .arg(longitude)
                .arg(latitude)
                .arg(member),
        )
        .await
    }

    /// 成员坐标 `(经度, 纬度)`，成员不存在时为 `None`
    pub async fn geo_pos(&self, key: &str, members: &[&str]) -> RedisResult<Vec<Option<(f64, f64)>>> {
        self.query(redis::cmd("GEOPOS").arg(key).arg(members)).await
    }

    pub async fn geo_dist(
        &self,
        key: &str,
        member1: &str,
        member2: &str,
        unit: GeoUnit,
    ) -> RedisResult<Option<f64>> {
        self.query(
            redis::cmd("GEODIST")
                .arg(key)
                .arg(member1)
                .arg(member2)
                .arg(unit.as_arg()),
        )
        .await
    }

    pub async fn geo_hash(&self, key: &str, members: &[&str]) -> RedisResult<Vec<Option<String>>> {
        self.query(redis::cmd("GEOHASH").arg(key).arg(members)).await
    }

    /// 以给定坐标为圆心按半径搜索成员，结果按距离升序
    pub async fn geo_search_radius(
        &self,
        key: &str,
        longitude: f64,
        latitude: f64,
        radius: f64,
        unit: GeoUnit,
    ) -> RedisResult<Vec<String>> {
        self.query(
            redis::cmd("GEOSEARCH")
                .arg(key)
                .arg("FROMLONLAT")
                .arg(longitude)
                .arg(latitude)
                .arg("BYRADIUS")
                .arg(radius)
                .arg(unit.as_arg())
                .arg("ASC"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    #[tokio::test]
    async fn test_facades_on_released_connection_fail_fast() {
        let released = SharedConnection::released();

        let err = StringCommands::new(released.clone()).get("k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);

        let err = SortedSetCommands::new(released.clone())
            .zrange_by_score("z", 0.0, 1.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);

        let err = GeoCommands::new(released.clone())
            .geo_pos("g", &["a"])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);

        let script = Script::new("return 1");
        let err = ScriptingCommands::new(released.clone())
            .eval::<i64>(&script, &[], &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);

        assert!(HashCommands::new(released).connection().is_released());
    }
}
