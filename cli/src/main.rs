//! tokenmirror CLI — inspect indexer state and defaults.
//!
//! Usage:
//! ```bash
//! tokenmirror status ./indexer.db
//! tokenmirror info
//! ```

use std::env;
use std::process;

use tokenmirror_core::storage::IndexerStorage;
use tokenmirror_indexer::IndexerConfig;
use tokenmirror_storage::sqlite::SqliteStorage;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "status" => {
            let Some(path) = args.get(2) else {
                eprintln!("status requires a database path");
                process::exit(1);
            };
            if let Err(err) = cmd_status(path) {
                eprintln!("Error: {err}");
                process::exit(1);
            }
        }
        "info" => cmd_info(),
        "version" | "--version" | "-V" => {
            println!("tokenmirror {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("tokenmirror {}", env!("CARGO_PKG_VERSION"));
    println!("Off-chain relational mirror of finalized ledger state\n");
    println!("USAGE:");
    println!("    tokenmirror <COMMAND>\n");
    println!("COMMANDS:");
    println!("    status <db>  Show last processed block in a SQLite database");
    println!("    info         Show TokenMirror configuration defaults");
    println!("    version      Print version");
    println!("    help         Print this help");
}

fn cmd_info() {
    let defaults = IndexerConfig::default();
    println!("TokenMirror v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default ancestor-walk bound: {} blocks", defaults.max_walk_depth);
    println!("  Default poll interval: {} ms", defaults.poll_interval_ms);
    println!("  Supported process version: 1");
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
    println!("  Entities: demands, matches, permissions, comments, transactions");
}

fn cmd_status(path: &str) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let storage = SqliteStorage::open(path).await?;
        match storage.last_processed_block().await? {
            Some(block) => {
                println!("Last processed block:");
                println!("  height: {}", block.height);
                println!("  hash:   {}", block.hash);
                println!("  at:     {}", block.created_at.to_rfc3339());
            }
            None => println!("No blocks processed yet"),
        }
        Ok(())
    })
}
