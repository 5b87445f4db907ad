//! MMDB metadata section
//!
//! The metadata is an ordinary data-section map stored after the marker
//! `"\xAB\xCD\xEFMaxMind.com"` near the end of the file. Only the fields the
//! reader needs (plus the descriptive ones users ask for) are extracted.

use crate::decoder::{DataValue, Decoder};
use crate::error::{MmdbError, Result};
use crate::walker::RecordSize;
use indexmap::IndexMap;
use serde::Serialize;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// The marker must appear within this many bytes of the end of the file
const METADATA_SEARCH_SIZE: usize = 128 * 1024;

/// Only major version 2 of the binary format exists
const SUPPORTED_MAJOR_VERSION: u16 = 2;

/// IP version of the search tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum IpVersion {
    /// IPv4 only
    V4,
    /// IPv6 (may include IPv4-mapped addresses)
    V6,
}

impl IpVersion {
    /// Number of address bits, which is also the maximum tree depth
    pub fn bit_len(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

impl From<IpVersion> for u8 {
    fn from(version: IpVersion) -> u8 {
        match version {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }
}

/// Parsed database metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    /// Major version of the binary format (always 2)
    pub binary_format_major_version: u16,
    /// Minor version of the binary format
    pub binary_format_minor_version: u16,
    /// Build time as seconds since the Unix epoch
    pub build_epoch: u64,
    /// Database type, e.g. "GeoIP2-City"
    pub database_type: String,
    /// Locale codes the database may contain names for
    pub languages: Vec<String>,
    /// Descriptions keyed by language code
    pub description: IndexMap<String, String>,
    /// IP version of the search tree
    pub ip_version: IpVersion,
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
}

impl Metadata {
    /// Find and parse the metadata of an MMDB file
    pub fn from_file(data: &[u8]) -> Result<Self> {
        let marker_offset = find_metadata_marker(data)?;
        Self::parse_at(data, marker_offset)
    }

    /// Parse the metadata map that follows the marker at `marker_offset`
    pub fn parse_at(data: &[u8], marker_offset: usize) -> Result<Self> {
        let metadata_start = marker_offset + METADATA_MARKER.len();

        // Pointers inside the metadata are relative to its start
        let value = Decoder::with_pointer_base(data, metadata_start)
            .decode(metadata_start)
            .map_err(|e| MmdbError::InvalidMetadata(format!("Failed to decode metadata: {}", e)))?
            .value;

        let map = match value {
            DataValue::Map(map) => map,
            other => {
                return Err(MmdbError::InvalidMetadata(format!(
                    "Metadata is a {}, not a map",
                    other.type_name()
                )))
            }
        };

        let binary_format_major_version = extract_u16(&map, "binary_format_major_version")?;
        if binary_format_major_version != SUPPORTED_MAJOR_VERSION {
            return Err(MmdbError::InvalidMetadata(format!(
                "Unsupported binary format major version: {}",
                binary_format_major_version
            )));
        }

        let ip_version = match extract_uint(&map, "ip_version")? {
            4 => IpVersion::V4,
            6 => IpVersion::V6,
            n => {
                return Err(MmdbError::InvalidMetadata(format!(
                    "Invalid IP version: {}",
                    n
                )))
            }
        };

        let node_count = u32::try_from(extract_uint(&map, "node_count")?).map_err(|_| {
            MmdbError::InvalidMetadata("node_count does not fit in 32 bits".to_string())
        })?;

        Ok(Metadata {
            binary_format_major_version,
            binary_format_minor_version: extract_u16(&map, "binary_format_minor_version")?,
            build_epoch: extract_uint(&map, "build_epoch")?,
            database_type: extract_string(&map, "database_type")?,
            languages: extract_languages(&map)?,
            description: extract_description(&map)?,
            ip_version,
            node_count,
            record_size: RecordSize::from_bits(extract_u16(&map, "record_size")?)?,
        })
    }

    /// Size of one tree node in bytes
    pub fn node_byte_size(&self) -> usize {
        self.record_size.node_bytes()
    }

    /// Size of the whole search tree in bytes
    pub fn search_tree_size(&self) -> usize {
        self.node_count as usize * self.node_byte_size()
    }

    /// Maximum depth of the search tree
    pub fn tree_depth(&self) -> u8 {
        self.ip_version.bit_len()
    }
}

/// Find the metadata marker in an MMDB file
///
/// The marker appears somewhere in the last 128KB of the file. If there are
/// multiple markers (unlikely but possible), the LAST one wins, matching
/// libmaxminddb.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize> {
    let search_start = data.len().saturating_sub(METADATA_SEARCH_SIZE);
    memchr::memmem::rfind(&data[search_start..], METADATA_MARKER)
        .map(|i| search_start + i)
        .ok_or(MmdbError::MetadataNotFound)
}

// Helper functions to extract values from the metadata map

fn extract_uint(map: &IndexMap<String, DataValue>, key: &str) -> Result<u64> {
    match map.get(key) {
        Some(value) => value.as_u64().ok_or_else(|| {
            MmdbError::InvalidMetadata(format!(
                "Field '{}' is a {}, not an unsigned integer",
                key,
                value.type_name()
            ))
        }),
        None => Err(MmdbError::InvalidMetadata(format!(
            "Required field '{}' not found",
            key
        ))),
    }
}

fn extract_u16(map: &IndexMap<String, DataValue>, key: &str) -> Result<u16> {
    let n = extract_uint(map, key)?;
    u16::try_from(n).map_err(|_| {
        MmdbError::InvalidMetadata(format!("Field '{}' out of range: {}", key, n))
    })
}

fn extract_string(map: &IndexMap<String, DataValue>, key: &str) -> Result<String> {
    match map.get(key) {
        Some(DataValue::String(s)) => Ok(s.clone()),
        Some(other) => Err(MmdbError::InvalidMetadata(format!(
            "Field '{}' is a {}, not a string",
            key,
            other.type_name()
        ))),
        None => Err(MmdbError::InvalidMetadata(format!(
            "Required field '{}' not found",
            key
        ))),
    }
}

fn extract_languages(map: &IndexMap<String, DataValue>) -> Result<Vec<String>> {
    match map.get("languages") {
        None => Ok(Vec::new()),
        Some(DataValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_owned).ok_or_else(|| {
                    MmdbError::InvalidMetadata("languages must be an array of strings".to_string())
                })
            })
            .collect(),
        Some(other) => Err(MmdbError::InvalidMetadata(format!(
            "Field 'languages' is a {}, not an array",
            other.type_name()
        ))),
    }
}

fn extract_description(map: &IndexMap<String, DataValue>) -> Result<IndexMap<String, String>> {
    match map.get("description") {
        None => Ok(IndexMap::new()),
        Some(DataValue::Map(entries)) => entries
            .iter()
            .map(|(lang, text)| match text {
                DataValue::String(s) => Ok((lang.clone(), s.clone())),
                _ => Err(MmdbError::InvalidMetadata(format!(
                    "Description for '{}' is not a string",
                    lang
                ))),
            })
            .collect(),
        Some(other) => Err(MmdbError::InvalidMetadata(format!(
            "Field 'description' is a {}, not a map",
            other.type_name()
        ))),
    }
}
