#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_reader::{Decoder, LruValueCache};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the start offset, the rest is the buffer
    let offset = data[0] as usize;
    let buffer = &data[1..];

    let _ = Decoder::new(buffer).with_max_depth(64).decode(offset);

    // Same buffer with a pointer base and a cache
    let cache = LruValueCache::new(16);
    let decoder = Decoder::with_pointer_base(buffer, offset / 2)
        .with_cache(&cache)
        .with_max_depth(64);
    let _ = decoder.decode(offset);
    let _ = decoder.decode_cached(offset);
});
