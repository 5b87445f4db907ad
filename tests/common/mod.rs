//! Helpers for assembling MMDB files byte by byte in tests
#![allow(dead_code)]

use mmdb_reader::METADATA_MARKER;
use std::net::IpAddr;

/// Control byte(s) plus size continuation bytes for a value of `type_num`
pub fn ctrl(type_num: u8, size: usize) -> Vec<u8> {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, vec![])
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        let n = size - 285;
        (30, vec![(n >> 8) as u8, n as u8])
    } else {
        let n = size - 65_821;
        (31, vec![(n >> 16) as u8, (n >> 8) as u8, n as u8])
    };

    let mut out = if type_num <= 7 {
        vec![(type_num << 5) | size_bits]
    } else {
        vec![size_bits, type_num - 7]
    };
    out.extend(extra);
    out
}

pub fn string(s: &str) -> Vec<u8> {
    let mut out = ctrl(2, s.len());
    out.extend_from_slice(s.as_bytes());
    out
}

pub fn bytes(b: &[u8]) -> Vec<u8> {
    let mut out = ctrl(4, b.len());
    out.extend_from_slice(b);
    out
}

fn minimal_be(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

fn unsigned(type_num: u8, be: &[u8]) -> Vec<u8> {
    let payload = minimal_be(be);
    let mut out = ctrl(type_num, payload.len());
    out.extend_from_slice(payload);
    out
}

pub fn uint16(n: u16) -> Vec<u8> {
    unsigned(5, &n.to_be_bytes())
}

pub fn uint32(n: u32) -> Vec<u8> {
    unsigned(6, &n.to_be_bytes())
}

pub fn uint64(n: u64) -> Vec<u8> {
    unsigned(9, &n.to_be_bytes())
}

pub fn uint128(n: u128) -> Vec<u8> {
    unsigned(10, &n.to_be_bytes())
}

pub fn double(d: f64) -> Vec<u8> {
    let mut out = ctrl(3, 8);
    out.extend_from_slice(&d.to_be_bytes());
    out
}

pub fn boolean(b: bool) -> Vec<u8> {
    ctrl(14, b as usize)
}

pub fn map(pairs: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = ctrl(7, pairs.len());
    for (key, value) in pairs {
        out.extend(string(key));
        out.extend_from_slice(value);
    }
    out
}

pub fn array(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = ctrl(11, items.len());
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Pointer to data section offset `value`, using the smallest size class
pub fn pointer(value: usize) -> Vec<u8> {
    if value < 2048 {
        vec![0x20 | ((value >> 8) & 0x7) as u8, value as u8]
    } else if value < 526_336 {
        let v = value - 2048;
        vec![0x28 | ((v >> 16) & 0x7) as u8, (v >> 8) as u8, v as u8]
    } else if value < 526_336 + (1 << 27) {
        let v = value - 526_336;
        vec![0x30 | ((v >> 24) & 0x7) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
    } else {
        let mut out = vec![0x38];
        out.extend_from_slice(&(value as u32).to_be_bytes());
        out
    }
}

pub fn metadata(ip_version: u16, record_size: u16, node_count: u32) -> Vec<u8> {
    map(&[
        ("binary_format_major_version", uint16(2)),
        ("binary_format_minor_version", uint16(0)),
        ("build_epoch", uint64(1_700_000_000)),
        ("database_type", string("Test-DB")),
        ("description", map(&[("en", string("Test database"))])),
        ("languages", array(&[string("en")])),
        ("ip_version", uint16(ip_version)),
        ("node_count", uint32(node_count)),
        ("record_size", uint16(record_size)),
    ])
}

#[derive(Clone, Copy)]
enum Record {
    Empty,
    Node(u32),
    Data(usize),
}

/// Search tree built from non-overlapping networks
struct TreeBuilder {
    nodes: Vec<[Record; 2]>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            nodes: vec![[Record::Empty; 2]],
        }
    }

    fn insert(&mut self, bits: u128, bit_len: u8, prefix_len: u8, data_offset: usize) {
        let mut node = 0usize;
        for i in 0..prefix_len {
            let bit = ((bits >> (bit_len - 1 - i)) & 1) as usize;
            if i == prefix_len - 1 {
                self.nodes[node][bit] = Record::Data(data_offset);
                break;
            }
            match self.nodes[node][bit] {
                Record::Node(n) => node = n as usize,
                _ => {
                    self.nodes.push([Record::Empty; 2]);
                    let n = self.nodes.len() - 1;
                    self.nodes[node][bit] = Record::Node(n as u32);
                    node = n;
                }
            }
        }
    }

    fn encode(&self, record_size: u16) -> Vec<u8> {
        let node_count = self.nodes.len() as u32;
        let value = |record: Record| match record {
            Record::Empty => node_count,
            Record::Node(n) => n,
            Record::Data(offset) => node_count + 16 + offset as u32,
        };

        let mut out = Vec::new();
        for [left, right] in &self.nodes {
            let (l, r) = (value(*left), value(*right));
            match record_size {
                24 => {
                    out.extend_from_slice(&l.to_be_bytes()[1..]);
                    out.extend_from_slice(&r.to_be_bytes()[1..]);
                }
                28 => {
                    out.extend_from_slice(&l.to_be_bytes()[1..]);
                    out.push((((l >> 24) & 0x0F) << 4) as u8 | ((r >> 24) & 0x0F) as u8);
                    out.extend_from_slice(&r.to_be_bytes()[1..]);
                }
                32 => {
                    out.extend_from_slice(&l.to_be_bytes());
                    out.extend_from_slice(&r.to_be_bytes());
                }
                other => panic!("unsupported record size {}", other),
            }
        }
        out
    }
}

fn parse_network(cidr: &str, ip_version: u16) -> (u128, u8, u8) {
    let (addr, prefix) = cidr.split_once('/').expect("network must be CIDR");
    let prefix: u8 = prefix.parse().expect("prefix length");
    match (addr.parse::<IpAddr>().expect("address"), ip_version) {
        (IpAddr::V4(v4), 4) => (u32::from(v4) as u128, 32, prefix),
        // IPv4 networks live under ::/96 in an IPv6 tree
        (IpAddr::V4(v4), _) => (u32::from(v4) as u128, 128, prefix + 96),
        (IpAddr::V6(v6), 6) => (u128::from(v6), 128, prefix),
        (IpAddr::V6(_), _) => panic!("IPv6 network in IPv4 database"),
    }
}

/// Assemble a complete database
///
/// `records` is the data section; `networks` maps CIDR strings to an offset
/// within it.
pub fn build_database_with_data(
    ip_version: u16,
    record_size: u16,
    records: &[u8],
    networks: &[(&str, usize)],
) -> Vec<u8> {
    let mut tree = TreeBuilder::new();
    for (cidr, offset) in networks {
        let (bits, bit_len, prefix_len) = parse_network(cidr, ip_version);
        tree.insert(bits, bit_len, prefix_len, *offset);
    }

    let mut db = tree.encode(record_size);
    db.extend_from_slice(&[0u8; 16]);
    db.extend_from_slice(records);
    db.extend_from_slice(METADATA_MARKER);
    db.extend(metadata(ip_version, record_size, tree.nodes.len() as u32));
    db
}

/// Assemble a database where each network has its own encoded record
pub fn build_database(ip_version: u16, record_size: u16, networks: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut records = Vec::new();
    let mut placed = Vec::new();
    for (cidr, record) in networks {
        placed.push((*cidr, records.len()));
        records.extend_from_slice(record);
    }
    build_database_with_data(ip_version, record_size, &records, &placed)
}
