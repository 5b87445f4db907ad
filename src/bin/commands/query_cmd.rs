use anyhow::{Context, Result};
use mmdb_reader::{Reader, ReaderOptions};
use serde_json::json;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli_utils::{data_value_to_json, format_cidr};

pub fn cmd_query(database: PathBuf, ip: String, quiet: bool, cache_size: usize) -> Result<()> {
    let addr: IpAddr = ip
        .parse()
        .with_context(|| format!("Not an IP address: {}", ip))?;

    let mut options = ReaderOptions::new();
    if cache_size > 0 {
        options = options.with_lru_cache(cache_size);
    }

    let reader = Reader::open_with_options(&database, options)
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let (record, prefix_len) = reader
        .lookup_prefix(addr)
        .with_context(|| format!("Query failed for: {}", ip))?;

    let found = record.is_some();
    if quiet {
        std::process::exit(if found { 0 } else { 1 });
    }

    // Always print an array for consistency
    match record {
        Some(data) => {
            let mut result = data_value_to_json(&data);
            if let serde_json::Value::Object(ref mut map) = result {
                map.insert("network".to_string(), json!(format_cidr(addr, prefix_len)));
                map.insert("prefix_len".to_string(), json!(prefix_len));
            }
            println!("{}", serde_json::to_string_pretty(&json!([result]))?);
        }
        None => println!("[]"),
    }

    std::process::exit(if found { 0 } else { 1 });
}
