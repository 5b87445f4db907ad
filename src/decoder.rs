//! Data section decoder
//!
//! Interprets an arbitrary byte offset of an MMDB buffer as a typed,
//! possibly nested value. Implements every data type of the MaxMind DB
//! format:
//!
//! - **Pointer**: Reference to another data item (resolved transparently)
//! - **String**: UTF-8 text data
//! - **Double**: 64-bit floating point (IEEE 754)
//! - **Bytes**: Raw byte arrays
//! - **Uint16**: Unsigned 16-bit integers
//! - **Uint32**: Unsigned 32-bit integers
//! - **Map**: Key-value pairs (string keys, encoding order preserved)
//! - **Int32**: Signed 32-bit integers
//! - **Uint64**: Unsigned 64-bit integers
//! - **Uint128**: Unsigned 128-bit integers
//! - **Array**: Ordered lists of values
//! - **Bool**: Boolean values
//! - **Float**: 32-bit floating point (IEEE 754)
//!
//! # Format
//!
//! Every value starts with a control byte. The top 3 bits are the type
//! (0 means "extended": the real type is `7 + next byte`), the low 5 bits
//! are the size, continued in up to 3 extra bytes for sizes >= 29.
//! All multi-byte integers are big-endian.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use crate::cache::{NoCache, ValueCache};
use crate::error::DecodeError;
use indexmap::IndexMap;

/// Default limit on container nesting plus pointer hops
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Additive base for each pointer size class
const POINTER_VALUE_OFFSETS: [usize; 4] = [0, 2048, 526_336, 0];

static NO_CACHE: NoCache = NoCache;

/// A decoded data section value
///
/// Pointers never appear here: the decoder resolves them to the value
/// they point at.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map, in encoding order
    Map(IndexMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Look up a key if this value is a map
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Unsigned value widened to u64, if this is an unsigned integer that fits
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            DataValue::Uint16(n) => Some(n as u64),
            DataValue::Uint32(n) => Some(n as u64),
            DataValue::Uint64(n) => Some(n),
            DataValue::Uint128(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) => "string",
            DataValue::Double(_) => "double",
            DataValue::Bytes(_) => "bytes",
            DataValue::Uint16(_) => "uint16",
            DataValue::Uint32(_) => "uint32",
            DataValue::Map(_) => "map",
            DataValue::Int32(_) => "int32",
            DataValue::Uint64(_) => "uint64",
            DataValue::Uint128(_) => "uint128",
            DataValue::Array(_) => "array",
            DataValue::Bool(_) => "boolean",
            DataValue::Float(_) => "float",
        }
    }
}

/// Type numbers defined by the format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DataType {
    /// Pointer into the data section
    Pointer = 1,
    /// UTF-8 string
    String = 2,
    /// 8-byte float
    Double = 3,
    /// Raw bytes
    Bytes = 4,
    /// 0-2 byte unsigned
    Uint16 = 5,
    /// 0-4 byte unsigned
    Uint32 = 6,
    /// Map with string keys
    Map = 7,
    /// 0-4 byte signed
    Int32 = 8,
    /// 0-8 byte unsigned
    Uint64 = 9,
    /// 0-16 byte unsigned
    Uint128 = 10,
    /// Array
    Array = 11,
    /// Data cache container (reserved, never decodable)
    Container = 12,
    /// End marker (reserved, never decodable)
    EndMarker = 13,
    /// Boolean stored in the size field
    Bool = 14,
    /// 4-byte float
    Float = 15,
}

impl DataType {
    /// Map a computed type number to a type
    pub fn from_code(code: u16) -> Option<Self> {
        let data_type = match code {
            1 => DataType::Pointer,
            2 => DataType::String,
            3 => DataType::Double,
            4 => DataType::Bytes,
            5 => DataType::Uint16,
            6 => DataType::Uint32,
            7 => DataType::Map,
            8 => DataType::Int32,
            9 => DataType::Uint64,
            10 => DataType::Uint128,
            11 => DataType::Array,
            12 => DataType::Container,
            13 => DataType::EndMarker,
            14 => DataType::Bool,
            15 => DataType::Float,
            _ => return None,
        };
        Some(data_type)
    }
}

/// A decoded value and the cursor just past its encoding
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The decoded value
    pub value: DataValue,
    /// Offset right after the value's own bytes
    pub offset: usize,
}

/// Data section decoder
///
/// Borrows the buffer; never copies or mutates it. A decoder is `Copy`
/// and `Sync`, so one instance can serve any number of threads.
#[derive(Clone, Copy)]
pub struct Decoder<'a> {
    buffer: &'a [u8],
    pointer_base: usize,
    cache: &'a dyn ValueCache,
    max_depth: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder whose pointers are relative to the start of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::with_pointer_base(buffer, 0)
    }

    /// Create a decoder for a data section embedded in a larger buffer
    ///
    /// # Arguments
    /// * `buffer` - The whole file
    /// * `pointer_base` - Absolute position pointer values are relative to
    ///   (the data section start)
    pub fn with_pointer_base(buffer: &'a [u8], pointer_base: usize) -> Self {
        Self {
            buffer,
            pointer_base,
            cache: &NO_CACHE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Cache pointer targets in `cache`
    ///
    /// The cache must only ever see this buffer and pointer base.
    pub fn with_cache(mut self, cache: &'a dyn ValueCache) -> Self {
        self.cache = cache;
        self
    }

    /// Limit container nesting plus pointer hops
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Absolute position pointer values are relative to
    pub fn pointer_base(&self) -> usize {
        self.pointer_base
    }

    /// Decode the value at absolute `offset`
    ///
    /// The returned cursor is the position after the value's own bytes. For
    /// a pointer that is the end of the pointer, not of the pointee.
    pub fn decode(&self, offset: usize) -> Result<Decoded, DecodeError> {
        self.decode_at(offset, 0)
    }

    /// Decode the value at `offset`, consulting the cache first
    pub fn decode_cached(&self, offset: usize) -> Result<DataValue, DecodeError> {
        if let Some(value) = self.cache.get(offset) {
            return Ok(value);
        }
        let value = self.decode_at(offset, 0)?.value;
        self.cache.set(offset, &value);
        Ok(value)
    }

    fn decode_at(&self, offset: usize, depth: usize) -> Result<Decoded, DecodeError> {
        if depth > self.max_depth {
            return Err(DecodeError::DepthLimitExceeded {
                offset,
                limit: self.max_depth,
            });
        }

        let ctrl = self.byte_at(offset)?;
        let mut cursor = offset + 1;

        let mut type_num = (ctrl >> 5) as u16;
        if type_num == 0 {
            type_num = 7 + self.byte_at(cursor)? as u16;
            if type_num < 8 {
                return Err(DecodeError::InvalidExtendedType {
                    offset: cursor,
                    value: type_num,
                });
            }
            cursor += 1;
        }

        let data_type =
            DataType::from_code(type_num).ok_or(DecodeError::UnknownType { type_num, offset })?;

        if data_type == DataType::Pointer {
            let (target, consumed) = self.decode_pointer(ctrl, cursor)?;
            let value = self.follow_pointer(target, depth + 1)?;
            return Ok(Decoded {
                value,
                offset: cursor + consumed,
            });
        }

        let (size, consumed) = self.size_from_ctrl_byte(ctrl, cursor)?;
        self.decode_by_type(data_type, offset, cursor + consumed, size, depth)
    }

    /// Resolve a pointer target, walking pointer-to-pointer chains in a loop
    fn follow_pointer(&self, target: usize, mut depth: usize) -> Result<DataValue, DecodeError> {
        if let Some(value) = self.cache.get(target) {
            return Ok(value);
        }

        let mut position = target;
        loop {
            if depth > self.max_depth {
                return Err(DecodeError::DepthLimitExceeded {
                    offset: position,
                    limit: self.max_depth,
                });
            }
            let ctrl = self.byte_at(position)?;
            if ctrl >> 5 != DataType::Pointer as u8 {
                break;
            }
            position = self.decode_pointer(ctrl, position + 1)?.0;
            depth += 1;
        }

        let value = self.decode_at(position, depth)?.value;
        self.cache.set(target, &value);
        Ok(value)
    }

    fn decode_by_type(
        &self,
        data_type: DataType,
        ctrl_offset: usize,
        offset: usize,
        size: usize,
        depth: usize,
    ) -> Result<Decoded, DecodeError> {
        let invalid_size = |type_name| DecodeError::InvalidSize {
            type_name,
            size,
            offset: ctrl_offset,
        };

        let value = match data_type {
            DataType::String => {
                let bytes = self.read(offset, size)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8 { offset })?;
                DataValue::String(s.to_owned())
            }
            DataType::Bytes => DataValue::Bytes(self.read(offset, size)?.to_vec()),
            DataType::Double => {
                if size != 8 {
                    return Err(invalid_size("double"));
                }
                DataValue::Double(f64::from_be_bytes(self.read_array(offset)?))
            }
            DataType::Float => {
                if size != 4 {
                    return Err(invalid_size("float"));
                }
                DataValue::Float(f32::from_be_bytes(self.read_array(offset)?))
            }
            DataType::Bool => {
                if size > 1 {
                    return Err(invalid_size("boolean"));
                }
                return Ok(Decoded {
                    value: DataValue::Bool(size == 1),
                    offset,
                });
            }
            // Oversized uint16/uint32 payloads are consumed and read as zero
            DataType::Uint16 => {
                let bytes = self.read(offset, size)?;
                DataValue::Uint16(if size > 2 { 0 } else { be_uint(bytes) as u16 })
            }
            DataType::Uint32 => {
                let bytes = self.read(offset, size)?;
                DataValue::Uint32(if size > 4 { 0 } else { be_uint(bytes) as u32 })
            }
            DataType::Int32 => {
                if size > 4 {
                    return Err(invalid_size("int32"));
                }
                let mut padded = [0u8; 4];
                padded[4 - size..].copy_from_slice(self.read(offset, size)?);
                DataValue::Int32(i32::from_be_bytes(padded))
            }
            DataType::Uint64 => {
                if size > 8 {
                    return Err(invalid_size("uint64"));
                }
                DataValue::Uint64(be_uint(self.read(offset, size)?) as u64)
            }
            DataType::Uint128 => {
                if size > 16 {
                    return Err(invalid_size("uint128"));
                }
                DataValue::Uint128(be_uint(self.read(offset, size)?))
            }
            DataType::Array => return self.decode_array(offset, size, depth),
            DataType::Map => return self.decode_map(offset, size, depth),
            // Pointers are resolved before dispatch; the reserved types hold no value
            DataType::Pointer | DataType::Container | DataType::EndMarker => {
                return Err(DecodeError::UnknownType {
                    type_num: data_type as u16,
                    offset: ctrl_offset,
                })
            }
        };

        Ok(Decoded {
            value,
            offset: offset + size,
        })
    }

    fn decode_array(&self, offset: usize, count: usize, depth: usize) -> Result<Decoded, DecodeError> {
        let mut array = Vec::with_capacity(self.capacity_hint(offset, count));
        let mut cursor = offset;

        for _ in 0..count {
            let element = self.decode_at(cursor, depth + 1)?;
            array.push(element.value);
            cursor = element.offset;
        }

        Ok(Decoded {
            value: DataValue::Array(array),
            offset: cursor,
        })
    }

    fn decode_map(&self, offset: usize, count: usize, depth: usize) -> Result<Decoded, DecodeError> {
        let mut map = IndexMap::with_capacity(self.capacity_hint(offset, count));
        let mut cursor = offset;

        for _ in 0..count {
            let key = match self.decode_at(cursor, depth + 1)? {
                Decoded {
                    value: DataValue::String(s),
                    offset,
                } => {
                    cursor = offset;
                    s
                }
                _ => return Err(DecodeError::NonStringKey { offset: cursor }),
            };

            let value = self.decode_at(cursor, depth + 1)?;
            cursor = value.offset;
            // Duplicate keys: last one wins
            map.insert(key, value.value);
        }

        Ok(Decoded {
            value: DataValue::Map(map),
            offset: cursor,
        })
    }

    /// Decode the size field of a control byte
    ///
    /// Returns `(size, extra_bytes_consumed)`, where the extra bytes start
    /// at `offset`.
    pub fn size_from_ctrl_byte(&self, ctrl: u8, offset: usize) -> Result<(usize, usize), DecodeError> {
        let size = (ctrl & 0x1F) as usize;
        match size {
            0..=28 => Ok((size, 0)),
            29 => Ok((29 + self.byte_at(offset)? as usize, 1)),
            30 => Ok((285 + be_uint(self.read(offset, 2)?) as usize, 2)),
            _ => Ok((65_821 + be_uint(self.read(offset, 3)?) as usize, 3)),
        }
    }

    /// Decode the pointer whose control byte is `ctrl` and whose value bytes start at `offset`
    ///
    /// Returns `(absolute_target, bytes_consumed)`.
    pub fn decode_pointer(&self, ctrl: u8, offset: usize) -> Result<(usize, usize), DecodeError> {
        let pointer_size = ((ctrl >> 3) & 0x3) as usize;
        let packed = be_uint(self.read(offset, pointer_size + 1)?) as usize;
        let high = (ctrl & 0x7) as usize;

        let value = match pointer_size {
            0 => (high << 8) | packed,
            1 => (high << 16) | packed,
            2 => (high << 24) | packed,
            // 4-byte pointers ignore the control byte bits
            _ => packed,
        } + POINTER_VALUE_OFFSETS[pointer_size];

        Ok((self.pointer_base.saturating_add(value), pointer_size + 1))
    }

    fn byte_at(&self, offset: usize) -> Result<u8, DecodeError> {
        self.buffer
            .get(offset)
            .copied()
            .ok_or(DecodeError::OutOfBounds {
                offset,
                needed: 1,
                len: self.buffer.len(),
            })
    }

    fn read(&self, offset: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        let out_of_bounds = DecodeError::OutOfBounds {
            offset,
            needed: len,
            len: self.buffer.len(),
        };
        let end = offset.checked_add(len).ok_or(out_of_bounds.clone())?;
        self.buffer.get(offset..end).ok_or(out_of_bounds)
    }

    fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.read(offset, N)?);
        Ok(bytes)
    }

    /// Every element takes at least one byte, so never reserve more than what is left
    fn capacity_hint(&self, offset: usize, count: usize) -> usize {
        count.min(self.buffer.len().saturating_sub(offset))
    }
}

/// Big-endian unsigned integer of up to 16 bytes
fn be_uint(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128)
}
