//! # Catalog Search CLI (`catalog`)
//!
//! ## Usage
//!
//! ```bash
//! catalog --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog init` | Create the store and index databases |
//! | `catalog ingest` | Run one ingestion pass over unconsumed files |
//! | `catalog search "<query>"` | Phrase search |
//! | `catalog get <id>` | Print one record |
//! | `catalog rebuild` | Wipe the index and re-index every store row |
//! | `catalog rebuild --truncate` | Truncate both sides and re-ingest files |
//! | `catalog stats` | Store/index counts and drift |
//! | `catalog serve` | HTTP server with background ingestion |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use catalog_search::{config, db, get, ingest, logging, rebuild, search, server, stats};

/// Catalog Search: XML catalog ingestion with a synchronized full-text index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/catalog.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Bulk XML catalog ingestion with a synchronized full-text index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store and index databases. Safe to run repeatedly.
    Init,

    /// Ingest every unconsumed input file once, in the foreground.
    ///
    /// Files are renamed with the consumed marker only after all of their
    /// records are stored and indexed.
    Ingest,

    /// Search records by phrase.
    Search {
        /// Phrase to search for.
        query: String,
    },

    /// Print a record by id.
    Get {
        /// Store id.
        id: i64,
    },

    /// Rebuild the index.
    ///
    /// By default the index is wiped and every store row is re-indexed.
    /// With `--truncate` the store is emptied too and unconsumed input files
    /// are ingested again.
    Rebuild {
        /// Also delete every store row and re-ingest from files.
        #[arg(long)]
        truncate: bool,
    },

    /// Show store/index counts and drift.
    Stats,

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(cfg.logging.format);

    match cli.command {
        Commands::Init => {
            let backends = db::Backends::open(&cfg).await?;
            backends.close().await;
            println!("Store and index initialized successfully.");
        }
        Commands::Ingest => {
            ingest::run_ingest(&cfg).await?;
        }
        Commands::Search { query } => {
            search::run_search(&cfg, &query).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
        Commands::Rebuild { truncate } => {
            rebuild::run_rebuild(&cfg, truncate).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
