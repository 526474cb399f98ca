//! 集群分区视图
//!
//! 由 `CLUSTER SLOTS` 的应答构建，记录每个槽区间的主节点和副本节点。

use std::collections::BTreeSet;

use redis::Value;

use super::config::NodeAddress;

/// 集群槽总数
pub const SLOT_COUNT: u16 = 16384;

/// 一个连续的槽区间及其归属
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
    pub master: NodeAddress,
    pub replicas: Vec<NodeAddress>,
}

impl SlotRange {
    pub fn contains(&self, slot: u16) -> bool {
        self.start <= slot && slot <= self.end
    }
}

/// 分区归属快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partitions {
    ranges: Vec<SlotRange>,
}

impl Partitions {
    pub fn new(mut ranges: Vec<SlotRange>) -> Self {
        ranges.sort_by_key(|range| range.start);
        Self { ranges }
    }

    /// 解析 `CLUSTER SLOTS` 应答
    ///
    /// 每个条目形如 `[start, end, [host, port, id, ...], [replica...]...]`。
    pub fn from_cluster_slots(value: &Value) -> Result<Self, String> {
        let entries = as_array(value).ok_or("CLUSTER SLOTS 应答不是数组")?;

        let mut ranges = Vec::with_capacity(entries.len());
        for entry in entries {
            let fields = as_array(entry).ok_or("槽条目不是数组")?;
            if fields.len() < 3 {
                return Err(format!("槽条目字段不足: {}", fields.len()));
            }

            let start = as_slot(&fields[0])?;
            let end = as_slot(&fields[1])?;
            if start > end {
                return Err(format!("无效的槽区间: {start}-{end}"));
            }

            let master = parse_node(&fields[2])?;
            let replicas = fields[3..]
                .iter()
                .map(parse_node)
                .collect::<Result<Vec<_>, _>>()?;

            ranges.push(SlotRange {
                start,
                end,
                master,
                replicas,
            });
        }

        Ok(Self::new(ranges))
    }

    pub fn ranges(&self) -> &[SlotRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// 所有已知节点，包括主节点和副本
    pub fn nodes(&self) -> BTreeSet<NodeAddress> {
        self.ranges
            .iter()
            .flat_map(|range| std::iter::once(&range.master).chain(range.replicas.iter()))
            .cloned()
            .collect()
    }

    pub fn masters(&self) -> BTreeSet<NodeAddress> {
        self.ranges.iter().map(|range| range.master.clone()).collect()
    }

    pub fn master_for_slot(&self, slot: u16) -> Option<&NodeAddress> {
        self.ranges
            .iter()
            .find(|range| range.contains(slot))
            .map(|range| &range.master)
    }

    pub fn master_for_key(&self, key: &[u8]) -> Option<&NodeAddress> {
        self.master_for_slot(key_slot(key))
    }

    /// 是否覆盖全部 16384 个槽
    pub fn covers_all_slots(&self) -> bool {
        let mut next: u32 = 0;
        for range in &self.ranges {
            if u32::from(range.start) > next {
                return false;
            }
            next = next.max(u32::from(range.end) + 1);
        }
        next == u32::from(SLOT_COUNT)
    }

    /// 两个视图是否至少有一个共同节点
    pub fn shares_node_with(&self, other: &Partitions) -> bool {
        let other_nodes = other.nodes();
        self.nodes().iter().any(|node| other_nodes.contains(node))
    }
}

/// 计算键所在的槽，支持 `{hash tag}`
pub fn key_slot(key: &[u8]) -> u16 {
    let hashed = match key.iter().position(|b| *b == b'{') {
        Some(open) => match key[open + 1..].iter().position(|b| *b == b'}') {
            Some(len) if len > 0 => &key[open + 1..open + 1 + len],
            _ => key,
        },
        None => key,
    };
    crc16(hashed) % SLOT_COUNT
}

/// CRC16/XMODEM
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn as_array(value: &Value) -> Option<&[Value]> {
    match value {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn as_slot(value: &Value) -> Result<u16, String> {
    match value {
        Value::Int(n) if (0..i64::from(SLOT_COUNT)).contains(n) => Ok(*n as u16),
        other => Err(format!("无效的槽编号: {other:?}")),
    }
}

fn parse_node(value: &Value) -> Result<NodeAddress, String> {
    let fields = as_array(value).ok_or("节点条目不是数组")?;
    if fields.len() < 2 {
        return Err("节点条目缺少主机或端口".to_string());
    }

    let host = match &fields[0] {
        Value::BulkString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::SimpleString(s) => s.clone(),
        other => return Err(format!("无效的节点主机: {other:?}")),
    };
    let port = match &fields[1] {
        Value::Int(n) => u16::try_from(*n).map_err(|_| format!("无效的节点端口: {n}"))?,
        other => return Err(format!("无效的节点端口: {other:?}")),
    };

    Ok(NodeAddress::new(host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(host: &str, port: i64, id: &str) -> Value {
        Value::Array(vec![
            Value::BulkString(host.as_bytes().to_vec()),
            Value::Int(port),
            Value::BulkString(id.as_bytes().to_vec()),
        ])
    }

    fn slots_reply() -> Value {
        Value::Array(vec![
            Value::Array(vec![
                Value::Int(8192),
                Value::Int(16383),
                node("10.0.0.2", 7000, "b"),
                node("10.0.0.4", 7000, "d"),
            ]),
            Value::Array(vec![
                Value::Int(0),
                Value::Int(8191),
                node("10.0.0.1", 7000, "a"),
                node("10.0.0.3", 7000, "c"),
            ]),
        ])
    }

    #[test]
    fn test_parse_cluster_slots() {
        let partitions = Partitions::from_cluster_slots(&slots_reply()).unwrap();

        assert_eq!(partitions.ranges().len(), 2);
        assert_eq!(partitions.ranges()[0].start, 0);
        assert_eq!(partitions.ranges()[0].master, NodeAddress::new("10.0.0.1", 7000));
        assert_eq!(
            partitions.ranges()[0].replicas,
            vec![NodeAddress::new("10.0.0.3", 7000)]
        );
        assert_eq!(partitions.nodes().len(), 4);
        assert_eq!(partitions.masters().len(), 2);
        assert!(partitions.covers_all_slots());
        assert_eq!(
            partitions.master_for_slot(9000),
            Some(&NodeAddress::new("10.0.0.2", 7000))
        );
    }

    #[test]
    fn test_parse_rejects_malformed_reply() {
        assert!(Partitions::from_cluster_slots(&Value::Nil).is_err());
        assert!(Partitions::from_cluster_slots(&Value::Array(vec![Value::Array(vec![
            Value::Int(10),
            Value::Int(5),
            node("h", 1, "x"),
        ])]))
        .is_err());
        assert!(Partitions::from_cluster_slots(&Value::Array(vec![Value::Array(vec![
            Value::Int(0),
            Value::Int(20000),
            node("h", 1, "x"),
        ])]))
        .is_err());
    }

    #[test]
    fn test_partial_coverage() {
        let partitions = Partitions::new(vec![SlotRange {
            start: 0,
            end: 100,
            master: NodeAddress::new("a", 1),
            replicas: vec![],
        }]);
        assert!(!partitions.covers_all_slots());
        assert_eq!(partitions.master_for_slot(101), None);
    }

    #[test]
    fn test_key_slot_matches_redis() {
        assert_eq!(key_slot(b"foo"), 12182);
        assert_eq!(key_slot(b"123456789"), 12739);
        assert_eq!(key_slot(b"{user1000}.following"), key_slot(b"user1000"));
        assert_eq!(key_slot(b"foo{}{bar}"), crc16(b"foo{}{bar}") % SLOT_COUNT);
        assert_eq!(key_slot(b"{}x"), crc16(b"{}x") % SLOT_COUNT);
    }

    #[test]
    fn test_shares_node_with() {
        let a = Partitions::from_cluster_slots(&slots_reply()).unwrap();
        let b = Partitions::new(vec![SlotRange {
            start: 0,
            end: 16383,
            master: NodeAddress::new("10.0.0.3", 7000),
            replicas: vec![],
        }]);
        let c = Partitions::new(vec![SlotRange {
            start: 0,
            end: 16383,
            master: NodeAddress::new("192.168.1.1", 7000),
            replicas: vec![],
        }]);
        assert!(a.shares_node_with(&b));
        assert!(!a.shares_node_with(&c));
    }
}
