#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_reader::{Reader, ReaderOptions};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fuzz_target!(|data: &[u8]| {
    if data.len() < 16 {
        return;
    }

    // First 16 bytes are the address, the rest is the database
    let mut addr = [0u8; 16];
    addr.copy_from_slice(&data[..16]);

    let options = ReaderOptions::new().with_max_depth(64);
    let Ok(reader) = Reader::from_bytes_with_options(data[16..].to_vec(), options) else {
        return;
    };

    let v6 = Ipv6Addr::from(addr);
    let v4 = Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]);
    let _ = reader.lookup_prefix(IpAddr::V6(v6));
    let _ = reader.lookup_prefix(IpAddr::V4(v4));
});
