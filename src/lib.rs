//! # Newsdesk
//!
//! Aggregates news from a fixed set of categorized RSS/Atom sources into one
//! deduplicated store.
//!
//! ## Architecture
//!
//! Every run pushes each configured source through the same pipeline:
//!
//! ```text
//! Registry → Fetcher → Parser → ImageResolver → Normalizer → Store
//! ```
//!
//! Sources are processed concurrently and independently: one unreachable or
//! malformed feed never prevents the others from being ingested. Records are
//! keyed by their link, so re-running is idempotent.
//!
//! ## Quick Start
//!
//! ```bash
//! # Ingest every configured source
//! newsdesk run
//!
//! # Show the latest sports headlines
//! newsdesk list --category Spor
//!
//! # Follow categories and list a personalised feed
//! newsdesk interests set alice Ekonomi Teknoloji
//! newsdesk list --for-you alice
//!
//! # Re-ingest every 30 minutes
//! newsdesk watch --interval 30m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together config, store,
/// fetcher and ingestor.
pub mod app;

/// Command-line interface using clap.
///
/// - `run [--json]` - Ingest all sources now
/// - `sources` - List the source registry
/// - `list` - List stored records with optional filters
/// - `interests set|show` - Manage followed categories
/// - `watch` - Re-run ingestion on an interval
pub mod cli;

/// Configuration file and the source registry.
///
/// Loads from `~/.config/newsdesk/config.toml`, creating a commented default
/// that lists the stock sources.
pub mod config;

/// Core domain models.
///
/// - [`Source`](domain::Source): one configured feed
/// - [`FeedEntry`](domain::FeedEntry): an entry as it appears in a feed
/// - [`NewsRecord`](domain::NewsRecord): the canonical stored record
pub mod domain;

/// Raw document retrieval.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for feed fetching
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Representative image selection for an entry.
pub mod image;

/// The ingestion run: bounded concurrency, failure isolation, run summary.
pub mod ingest;

/// Entry to record conversion.
pub mod normalizer;

/// Feed document decoding.
///
/// RSS 2.0, RSS 1.0 (RDF) and Atom are read with quick-xml; JSON Feed goes
/// through feed-rs.
pub mod parser;

/// Periodic ingestion for the `watch` command.
pub mod scheduler;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
