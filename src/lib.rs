//! # Catalog Search
//!
//! Bulk ingestion of XML product catalogs into a durable store, with a
//! separately managed full-text index kept in sync and a query path that
//! joins index hits back to the authoritative rows.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐
//! │ XML files  │──▶│ normalize  │──▶│ store (rows) │
//! │ (source)   │   │ + id       │   └──────┬───────┘
//! └────────────┘   └─────┬──────┘          │ by id
//!                        ▼                 │
//!                 ┌────────────┐    ┌──────┴───────┐
//!                 │  batcher   │──▶ │ index (FTS5) │
//!                 └────────────┘    └──────┬───────┘
//!                                          ▼
//!                                   ┌──────────────┐
//!                                   │ search / CLI │
//!                                   │ HTTP         │
//!                                   └──────────────┘
//! ```
//!
//! Store and index are separate SQLite databases with no shared commit. A
//! file is renamed with the consumed marker only after every record from it
//! is persisted and indexed. Drift after a crash is repaired with a rebuild.
//!
//! ## Quick Start
//!
//! ```bash
//! catalog init                  # create store and index
//! catalog ingest                # ingest unconsumed XML files
//! catalog search "phone case"   # phrase search
//! catalog rebuild               # re-index every store row
//! catalog serve                 # HTTP server with background ingestion
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`source`] | Input discovery, XML parsing, consumed marking |
//! | [`normalize`] | Two schemas into one record shape |
//! | [`ids`] | Identifier authority |
//! | [`store`] | Durable store trait and backends |
//! | [`index`] | Full-text index trait and backends |
//! | [`batch`] | Bulk index writes |
//! | [`ingest`] | Ingestion coordinator |
//! | [`search`] | Query coordinator |
//! | [`rebuild`] | Recovery paths |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connections |
//! | [`migrate`] | Schema migrations |

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod get;
pub mod ids;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod picture;
pub mod rebuild;
pub mod search;
pub mod server;
pub mod source;
pub mod stats;
pub mod store;
