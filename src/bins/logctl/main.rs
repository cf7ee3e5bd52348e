//! `logctl`: a small operator CLI over a [`logstore::LogStore`], the same scope
//! `examples/tursodatabase-libsql/libsql-wal/src/bins`'s shell/compactor binaries cover for `libsql-wal`, narrowed
//! to this crate's own API instead of sqlite-VFS internals.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logstore::{LogAddress, LogStore, StoreConfig};

#[derive(Parser)]
#[command(name = "logctl", about = "Operate on a log store's segment directory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print per-segment known/trimmed/pending address counts.
    Stat { log_dir: PathBuf },
    /// Run a compaction pass and report how many segments were rewritten.
    Compact { log_dir: PathBuf },
    /// Read and print one entry.
    Dump { log_dir: PathBuf, address: u64 },
}

/// Segment numbers of every un-stream-scoped `<n>.log` file in `log_dir`, sorted.
/// Stream-scoped segments (`<stream>-<n>.log`) are left for a future `--stream`
/// flag; this CLI only ever addresses the default, streamless namespace.
fn segment_numbers(log_dir: &std::path::Path) -> Result<Vec<u64>> {
    let mut numbers = std::fs::read_dir(log_dir)
        .with_context(|| format!("reading {}", log_dir.display()))?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            e.file_name()
                .to_string_lossy()
                .strip_suffix(".log")?
                .parse::<u64>()
                .ok()
        })
        .collect::<Vec<_>>();
    numbers.sort_unstable();
    Ok(numbers)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Stat { log_dir } => stat(log_dir),
        Command::Compact { log_dir } => compact(log_dir),
        Command::Dump { log_dir, address } => dump(log_dir, address),
    }
}

fn stat(log_dir: PathBuf) -> Result<()> {
    let store = LogStore::open(StoreConfig::new(&log_dir)).context("opening log store")?;
    for number in segment_numbers(&log_dir)? {
        let first_address = number * store.config().records_per_log_file;
        let stats = store
            .segment_stats(LogAddress::new(first_address))
            .context("reading segment stats")?;
        let size = std::fs::metadata(log_dir.join(format!("{number}.log")))?.len();
        println!(
            "{number}.log\t{size} bytes\tknown={}\ttrimmed={}\tpending={}",
            stats.known, stats.trimmed, stats.pending
        );
    }
    store.close()?;
    Ok(())
}

fn compact(log_dir: PathBuf) -> Result<()> {
    let store = LogStore::open(StoreConfig::new(&log_dir)).context("opening log store")?;
    // A fresh store has nothing cached yet; `compact` only considers segments the
    // cache already holds, so warm it by touching one address per segment file.
    for number in segment_numbers(&log_dir)? {
        let first_address = number * store.config().records_per_log_file;
        let _ = store.read(LogAddress::new(first_address));
    }
    let compacted = store.compact().context("compacting")?;
    println!("compacted {compacted} segment(s)");
    store.close()?;
    Ok(())
}

fn dump(log_dir: PathBuf, address: u64) -> Result<()> {
    let store = LogStore::open(StoreConfig::new(&log_dir)).context("opening log store")?;
    match store.read(LogAddress::new(address))? {
        Some(entry) => println!("{entry:?}"),
        None => println!("address {address} is unknown"),
    }
    Ok(())
}
