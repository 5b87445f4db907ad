use anyhow::{Context, Result};
use mmdb_reader::Decoder;
use serde_json::json;
use std::fs::File;
use std::path::PathBuf;

use crate::cli_utils::data_value_to_json;

pub fn cmd_decode(file: PathBuf, offset: usize, base: usize, max_depth: usize) -> Result<()> {
    let handle =
        File::open(&file).with_context(|| format!("Failed to open: {}", file.display()))?;
    // SAFETY: read-only map of a file we do not modify
    let mmap = unsafe { memmap2::Mmap::map(&handle) }
        .with_context(|| format!("Failed to mmap: {}", file.display()))?;

    let decoded = Decoder::with_pointer_base(&mmap, base)
        .with_max_depth(max_depth)
        .decode(offset)
        .with_context(|| format!("Failed to decode value at offset {}", offset))?;

    let output = json!({
        "offset": offset,
        "next_offset": decoded.offset,
        "value": data_value_to_json(&decoded.value),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
