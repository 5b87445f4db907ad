//! Search tree node walker
//!
//! Each node of the binary search tree holds two records (left and right)
//! of `record_size` bits each, packed big-endian. A record is either the
//! index of another node, the node count ("not found"), or a value above the
//! node count that points into the data section.
//!
//! The walker only reads records; interpreting them is the reader's job.

use crate::error::MmdbError;

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(into = "u16")]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32,
}

impl RecordSize {
    /// Create from bit size
    pub fn from_bits(bits: u16) -> Result<Self, MmdbError> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(MmdbError::UnsupportedRecordSize(bits)),
        }
    }

    /// Bits per record
    pub fn bits(self) -> u16 {
        match self {
            RecordSize::Bits24 => 24,
            RecordSize::Bits28 => 28,
            RecordSize::Bits32 => 32,
        }
    }

    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        self.bits() as usize * 2 / 8
    }
}

impl From<RecordSize> for u16 {
    fn from(size: RecordSize) -> u16 {
        size.bits()
    }
}

/// Reads left/right records of tree nodes
///
/// Offsets are byte offsets of a node (node index * node size). Reads are
/// not bounds-checked beyond slice indexing: callers walk nodes below the
/// node count, whose bytes are guaranteed to exist once the reader has
/// validated the tree size against the buffer.
#[derive(Debug, Clone, Copy)]
pub struct Walker<'a> {
    data: &'a [u8],
    record_size: RecordSize,
}

impl<'a> Walker<'a> {
    /// Create a walker for a tree with `record_size_bits` bit records
    pub fn new(data: &'a [u8], record_size_bits: u16) -> Result<Self, MmdbError> {
        Ok(Self::with_record_size(data, RecordSize::from_bits(record_size_bits)?))
    }

    /// Create a walker from an already validated record size
    pub fn with_record_size(data: &'a [u8], record_size: RecordSize) -> Self {
        Self { data, record_size }
    }

    /// Record size this walker reads
    pub fn record_size(&self) -> RecordSize {
        self.record_size
    }

    /// Byte offset of node `node`
    #[inline]
    pub fn node_offset(&self, node: u32) -> usize {
        node as usize * self.record_size.node_bytes()
    }

    /// Left record (followed for a 0 bit)
    #[inline]
    pub fn left(&self, node_offset: usize) -> u32 {
        let bytes = &self.data[node_offset..];
        match self.record_size {
            RecordSize::Bits24 => be24(&bytes[0..3]),
            // High nibble of the middle byte belongs to the left record
            RecordSize::Bits28 => ((bytes[3] as u32 & 0xF0) << 20) | be24(&bytes[0..3]),
            RecordSize::Bits32 => be32(&bytes[0..4]),
        }
    }

    /// Right record (followed for a 1 bit)
    #[inline]
    pub fn right(&self, node_offset: usize) -> u32 {
        let bytes = &self.data[node_offset..];
        match self.record_size {
            RecordSize::Bits24 => be24(&bytes[3..6]),
            // Low nibble of the middle byte belongs to the right record
            RecordSize::Bits28 => ((bytes[3] as u32 & 0x0F) << 24) | be24(&bytes[4..7]),
            RecordSize::Bits32 => be32(&bytes[4..8]),
        }
    }

    /// Record selected by `bit` (0 = left, anything else = right)
    #[inline]
    pub fn child(&self, node_offset: usize, bit: u8) -> u32 {
        if bit == 0 {
            self.left(node_offset)
        } else {
            self.right(node_offset)
        }
    }
}

#[inline]
fn be24(b: &[u8]) -> u32 {
    ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32)
}

#[inline]
fn be32(b: &[u8]) -> u32 {
    ((b[0] as u32) << 24) | ((b[1] as u32) << 16) | ((b[2] as u32) << 8) | (b[3] as u32)
}
