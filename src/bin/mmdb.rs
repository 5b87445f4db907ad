mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{cmd_decode, cmd_inspect, cmd_query};

#[derive(Parser)]
#[command(name = "mmdb")]
#[command(
    about = "Read MaxMind DB (MMDB) files",
    long_about = "mmdb - Zero-copy reader for MaxMind DB (MMDB) files\n\n\
    Look up IP addresses, inspect database metadata, and decode raw\n\
    data section values at arbitrary offsets.\n\n\
    Examples:\n\
      mmdb query GeoLite2-City.mmdb 175.16.199.255\n\
      mmdb inspect GeoLite2-City.mmdb --json\n\
      mmdb decode GeoLite2-City.mmdb 1234 --base 1000"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up an IP address in a database
    Query {
        /// Path to the MMDB file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// IPv4 or IPv6 address to look up
        #[arg(value_name = "IP")]
        ip: String,

        /// Quiet mode - no output, only exit code (0 = found, 1 = not found)
        #[arg(short, long)]
        quiet: bool,

        /// LRU cache capacity (default: 0, disabled)
        #[arg(long, default_value = "0")]
        cache_size: usize,
    },

    /// Show database metadata
    Inspect {
        /// Path to the MMDB file
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output metadata as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Decode the data section value at a byte offset of any file
    Decode {
        /// File to read
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Absolute byte offset of the value
        #[arg(value_name = "OFFSET")]
        offset: usize,

        /// Absolute offset pointers are relative to (the data section start)
        #[arg(long, default_value = "0")]
        base: usize,

        /// Maximum container nesting plus pointer hops
        #[arg(long, default_value_t = mmdb_reader::DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            database,
            ip,
            quiet,
            cache_size,
        } => cmd_query(database, ip, quiet, cache_size),
        Commands::Inspect { database, json } => cmd_inspect(database, json),
        Commands::Decode {
            file,
            offset,
            base,
            max_depth,
        } => cmd_decode(file, offset, base, max_depth),
    }
}
