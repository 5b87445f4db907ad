//! mmdb-reader - Zero-copy reader for MaxMind DB (MMDB) files
//!
//! MMDB files map IP networks to structured records. A file is a packed
//! binary search tree followed by a self-describing data section and a
//! metadata map. This crate provides the two engines needed to read one:
//!
//! - [`Decoder`]: interprets any byte offset as a typed, possibly nested
//!   [`DataValue`], following pointers transparently
//! - [`Walker`]: reads the left/right records of a tree node for 24, 28
//!   and 32-bit record sizes
//!
//! plus a [`Reader`] that uses both to look up IP addresses.
//!
//! # Quick Start
//!
//! ```no_run
//! use mmdb_reader::{Reader, ReaderOptions};
//!
//! let reader = Reader::open_with_options(
//!     "GeoLite2-City.mmdb",
//!     ReaderOptions::new().with_lru_cache(10_000),
//! )?;
//!
//! let (record, prefix_len) = reader.lookup_prefix("175.16.199.255".parse()?)?;
//! if let Some(record) = record {
//!     println!("/{}: {:?}", prefix_len, record.get("city"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Decoding raw buffers
//!
//! The decoder works on any byte slice, independent of a reader:
//!
//! ```rust
//! use mmdb_reader::{DataValue, Decoder};
//!
//! // Array of two strings: ["Foo", "人"]
//! let bytes = [0x02, 0x04, 0x43, b'F', b'o', b'o', 0x43, 0xe4, 0xba, 0xba];
//! let decoded = Decoder::new(&bytes).decode(0)?;
//!
//! assert_eq!(
//!     decoded.value,
//!     DataValue::Array(vec![
//!         DataValue::String("Foo".to_string()),
//!         DataValue::String("人".to_string()),
//!     ])
//! );
//! assert_eq!(decoded.offset, bytes.len());
//! # Ok::<(), mmdb_reader::DecodeError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Decoded value caches
pub mod cache;
/// Data section decoder
pub mod decoder;
/// Error types
pub mod error;
/// Metadata section parsing
pub mod metadata;
/// Database reader
pub mod reader;
/// Search tree node walker
pub mod walker;

pub use crate::cache::{LruValueCache, NoCache, ValueCache};
pub use crate::decoder::{DataType, DataValue, Decoded, Decoder, DEFAULT_MAX_DEPTH};
pub use crate::error::{DecodeError, MmdbError, Result};
pub use crate::metadata::{IpVersion, Metadata, METADATA_MARKER};
pub use crate::reader::{Reader, ReaderOptions};
pub use crate::walker::{RecordSize, Walker};
