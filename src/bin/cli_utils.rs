use mmdb_reader::DataValue;
use serde_json::json;
use std::net::IpAddr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Render a decoded value as JSON, keeping map order
///
/// u128 values do not fit a JSON number and are rendered as decimal strings.
pub fn data_value_to_json(data: &DataValue) -> serde_json::Value {
    match data {
        DataValue::String(s) => json!(s),
        DataValue::Double(d) => json!(d),
        DataValue::Bytes(b) => json!(b),
        DataValue::Uint16(u) => json!(u),
        DataValue::Uint32(u) => json!(u),
        DataValue::Uint64(u) => json!(u),
        DataValue::Uint128(u) => json!(u.to_string()),
        DataValue::Int32(i) => json!(i),
        DataValue::Bool(b) => json!(b),
        DataValue::Float(f) => json!(f),
        DataValue::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                map.insert(k.clone(), data_value_to_json(v));
            }
            json!(map)
        }
        DataValue::Array(items) => {
            json!(items.iter().map(data_value_to_json).collect::<Vec<_>>())
        }
    }
}

/// Network containing `addr` with the given prefix length, in CIDR notation
pub fn format_cidr(addr: IpAddr, prefix_len: u8) -> String {
    match addr {
        IpAddr::V4(ipv4) => {
            let mask = if prefix_len == 0 {
                0u32
            } else {
                !0u32 << (32 - prefix_len.min(32))
            };
            let network = std::net::Ipv4Addr::from(u32::from(ipv4) & mask);
            format!("{}/{}", network, prefix_len)
        }
        IpAddr::V6(ipv6) => {
            let mask = if prefix_len == 0 {
                0u128
            } else {
                !0u128 << (128 - prefix_len.min(128))
            };
            let network = std::net::Ipv6Addr::from(u128::from(ipv6) & mask);
            format!("{}/{}", network, prefix_len)
        }
    }
}

/// Format a build epoch as an RFC 3339 UTC timestamp
pub fn format_unix_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| format!("Invalid timestamp: {}", timestamp))
}
