//! MMDB database reader
//!
//! Ties the pieces together: finds the metadata, walks the search tree one
//! address bit at a time with [`Walker`], and decodes the record it lands on
//! with [`Decoder`].
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Search tree (node_count *   │  <- Walker
//! │  node_byte_size bytes)       │
//! ├──────────────────────────────┤
//! │  16 zero bytes (separator)   │
//! ├──────────────────────────────┤
//! │  Data section                │  <- Decoder (pointer base)
//! ├──────────────────────────────┤
//! │  "\xAB\xCD\xEFMaxMind.com"   │
//! │  Metadata map                │
//! └──────────────────────────────┘
//! ```

use crate::cache::{LruValueCache, NoCache, ValueCache};
use crate::decoder::{DataValue, Decoder, DEFAULT_MAX_DEPTH};
use crate::error::{MmdbError, Result};
use crate::metadata::{find_metadata_marker, IpVersion, Metadata};
use crate::walker::Walker;
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Size of the zero separator between the search tree and the data section
pub const DATA_SECTION_SEPARATOR_SIZE: usize = 16;

/// Left records followed from the root to reach `::0.0.0.0/96` in an IPv6 tree
const IPV4_SUBTREE_DEPTH: usize = 96;

/// Where a reader gets its value cache from
#[derive(Clone)]
enum CacheSetting {
    None,
    /// A fresh LRU cache is created for every reader opened with these options
    Lru(usize),
    /// Caller-supplied cache, used as is
    Shared(Arc<dyn ValueCache>),
}

/// Reader configuration
///
/// Options can be cloned and reused for several databases. A cache set with
/// [`with_lru_cache`](Self::with_lru_cache) is created per reader; a cache
/// passed to [`with_cache`](Self::with_cache) is shared by every reader the
/// options are used for and must therefore only be used with one database.
#[derive(Clone)]
pub struct ReaderOptions {
    cache: CacheSetting,
    max_depth: usize,
}

impl ReaderOptions {
    /// Defaults: no cache, depth limit of [`DEFAULT_MAX_DEPTH`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cache` for decoded records and pointer targets
    ///
    /// Entries are keyed by buffer offset only, so the cache must not be
    /// shared between readers of different databases.
    pub fn with_cache(mut self, cache: Arc<dyn ValueCache>) -> Self {
        self.cache = CacheSetting::Shared(cache);
        self
    }

    /// Give each reader its own LRU cache holding up to `capacity` decoded values
    pub fn with_lru_cache(mut self, capacity: usize) -> Self {
        self.cache = CacheSetting::Lru(capacity);
        self
    }

    /// Limit container nesting plus pointer hops while decoding
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Configured depth limit
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn build_cache(&self) -> Arc<dyn ValueCache> {
        match &self.cache {
            CacheSetting::None => Arc::new(NoCache),
            CacheSetting::Lru(capacity) => Arc::new(LruValueCache::new(*capacity)),
            CacheSetting::Shared(cache) => Arc::clone(cache),
        }
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            cache: CacheSetting::None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = match &self.cache {
            CacheSetting::None => "none".to_string(),
            CacheSetting::Lru(capacity) => format!("lru({})", capacity),
            CacheSetting::Shared(_) => "shared".to_string(),
        };
        f.debug_struct("ReaderOptions")
            .field("cache", &cache)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// Storage for database data - either owned or memory-mapped
enum Storage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v.as_slice(),
            Storage::Mmap(m) => &m[..],
        }
    }
}

/// Read-only MMDB database
///
/// Lookups take `&self` and the reader is `Send + Sync`, so one instance can
/// be shared (e.g. in an `Arc`) across any number of threads.
///
/// # Examples
///
/// ```no_run
/// use mmdb_reader::Reader;
///
/// let reader = Reader::open("GeoLite2-Country.mmdb")?;
/// if let Some(record) = reader.lookup("1.1.1.1".parse()?)? {
///     println!("{:?}", record.get("country"));
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Reader {
    storage: Storage,
    metadata: Metadata,
    data_section_start: usize,
    data_section_end: usize,
    ipv4_start: u32,
    cache: Arc<dyn ValueCache>,
    max_depth: usize,
}

impl Reader {
    /// Open a database file using memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    /// Open a database file using memory mapping, with options
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the map is read-only; callers must not truncate the file while it is open
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_storage(Storage::Mmap(mmap), options)
    }

    /// Create a reader over an in-memory database
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_options(data, ReaderOptions::default())
    }

    /// Create a reader over an in-memory database, with options
    pub fn from_bytes_with_options(data: Vec<u8>, options: ReaderOptions) -> Result<Self> {
        Self::from_storage(Storage::Owned(data), options)
    }

    fn from_storage(storage: Storage, options: ReaderOptions) -> Result<Self> {
        let data = storage.as_slice();
        let marker_offset = find_metadata_marker(data)?;
        let metadata = Metadata::parse_at(data, marker_offset)?;

        let data_section_start = metadata.search_tree_size() + DATA_SECTION_SEPARATOR_SIZE;
        if data_section_start > marker_offset {
            return Err(MmdbError::InvalidFormat(format!(
                "Search tree ({} bytes) overlaps metadata at offset {}",
                metadata.search_tree_size(),
                marker_offset
            )));
        }

        let ipv4_start = match metadata.ip_version {
            IpVersion::V4 => 0,
            IpVersion::V6 => {
                let walker = Walker::with_record_size(data, metadata.record_size);
                let mut node = 0u32;
                for _ in 0..IPV4_SUBTREE_DEPTH {
                    if node >= metadata.node_count {
                        break;
                    }
                    node = walker.left(walker.node_offset(node));
                }
                node
            }
        };

        tracing::debug!(
            database_type = %metadata.database_type,
            node_count = metadata.node_count,
            record_size = metadata.record_size.bits(),
            ip_version = u8::from(metadata.ip_version),
            ipv4_start,
            "opened MMDB database"
        );

        Ok(Reader {
            storage,
            metadata,
            data_section_start,
            data_section_end: marker_offset,
            ipv4_start,
            cache: options.build_cache(),
            max_depth: options.max_depth,
        })
    }

    /// Database metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Raw database bytes
    pub fn buffer(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Absolute offset of the first data section byte
    pub fn data_section_start(&self) -> usize {
        self.data_section_start
    }

    /// Walker over this database's search tree
    pub fn walker(&self) -> Walker<'_> {
        Walker::with_record_size(self.buffer(), self.metadata.record_size)
    }

    /// Decoder over this database's data section, sharing the reader's cache
    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::with_pointer_base(self.buffer(), self.data_section_start)
            .with_cache(self.cache.as_ref())
            .with_max_depth(self.max_depth)
    }

    /// Look up the record for an IP address
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<DataValue>> {
        Ok(self.lookup_prefix(ip)?.0)
    }

    /// Look up an IP address given as a string
    pub fn lookup_str(&self, ip: &str) -> Result<Option<DataValue>> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| MmdbError::InvalidIpAddress(ip.to_string()))?;
        self.lookup(addr)
    }

    /// Look up the record for an IP address along with the prefix length of
    /// the network it was found in (or the depth the search ended at)
    pub fn lookup_prefix(&self, ip: IpAddr) -> Result<(Option<DataValue>, u8)> {
        let (offset, prefix_len) = self.find(ip)?;
        let data = match offset {
            Some(offset) => Some(self.decoder().decode_cached(offset)?),
            None => None,
        };
        Ok((data, prefix_len))
    }

    /// Walk the search tree for `ip`
    ///
    /// Returns the absolute data offset of the record, if any, and the
    /// number of bits consumed.
    pub fn find(&self, ip: IpAddr) -> Result<(Option<usize>, u8)> {
        let (bits, bit_len, mut node) = match ip {
            IpAddr::V4(addr) => (u32::from(addr) as u128, 32u8, self.ipv4_start),
            IpAddr::V6(addr) => {
                if self.metadata.ip_version == IpVersion::V4 {
                    return Err(MmdbError::InvalidIpAddress(format!(
                        "Cannot look up IPv6 address {} in an IPv4-only database",
                        addr
                    )));
                }
                (u128::from(addr), 128u8, 0)
            }
        };

        let node_count = self.metadata.node_count;
        let walker = self.walker();
        let mut depth = 0u8;

        while depth < bit_len && node < node_count {
            let bit = ((bits >> (bit_len - 1 - depth)) & 1) as u8;
            node = walker.child(walker.node_offset(node), bit);
            depth += 1;
        }

        let offset = if node > node_count {
            Some(self.resolve_data_offset(node)?)
        } else if node == node_count {
            None
        } else {
            return Err(MmdbError::InvalidFormat(format!(
                "Invalid tree node {} after {} bits",
                node, depth
            )));
        };

        tracing::trace!(%ip, prefix_len = depth, found = offset.is_some(), "lookup");
        Ok((offset, depth))
    }

    /// Convert a record value above the node count to an absolute data offset
    fn resolve_data_offset(&self, record: u32) -> Result<usize> {
        let offset = (record - self.metadata.node_count) as usize + self.metadata.search_tree_size();
        if offset < self.data_section_start || offset >= self.data_section_end {
            return Err(MmdbError::InvalidFormat(format!(
                "Record {} points outside the data section (offset {})",
                record, offset
            )));
        }
        Ok(offset)
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("metadata", &self.metadata)
            .field("data_section_start", &self.data_section_start)
            .field("ipv4_start", &self.ipv4_start)
            .finish_non_exhaustive()
    }
}
