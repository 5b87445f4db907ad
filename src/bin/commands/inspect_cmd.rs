use anyhow::{Context, Result};
use mmdb_reader::Reader;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::format_unix_timestamp;

pub fn cmd_inspect(database: PathBuf, json_output: bool) -> Result<()> {
    let reader = Reader::open(&database)
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let metadata = reader.metadata();

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "size": reader.buffer().len(),
            "search_tree_size": metadata.search_tree_size(),
            "data_section_start": reader.data_section_start(),
            "metadata": metadata,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database: {}", database.display());
    println!("Type:     {}", metadata.database_type);
    println!(
        "Format:   v{}.{}",
        metadata.binary_format_major_version, metadata.binary_format_minor_version
    );
    println!(
        "Built:    {}",
        format_unix_timestamp(metadata.build_epoch)
    );
    println!();
    println!("Search tree:");
    println!("  IP version:   {}", u8::from(metadata.ip_version));
    println!("  Nodes:        {}", metadata.node_count);
    println!("  Record size:  {} bits", metadata.record_size.bits());
    println!("  Tree size:    {} bytes", metadata.search_tree_size());
    println!("  Data section: starts at offset {}", reader.data_section_start());

    if !metadata.languages.is_empty() {
        println!();
        println!("Languages:  {}", metadata.languages.join(", "));
    }

    if !metadata.description.is_empty() {
        println!();
        println!("Description:");
        for (lang, text) in &metadata.description {
            println!("  [{}] {}", lang, text);
        }
    }

    Ok(())
}
