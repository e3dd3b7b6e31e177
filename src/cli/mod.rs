pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::DEFAULT_LIST_LIMIT;

#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(about = "Aggregates categorized news feeds into one store", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/newsdesk/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overrides `[store] path`
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Number of sources fetched concurrently, overrides `[fetcher] workers`
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run ingestion over every configured source now
    Run {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured sources
    Sources,
    /// List stored records, newest first
    List {
        /// Only records of this category
        #[arg(long)]
        category: Option<String>,

        /// Only records from this source label
        #[arg(long)]
        source: Option<String>,

        /// Only records in the categories this user follows
        #[arg(long, value_name = "USER")]
        for_you: Option<String>,

        /// Maximum records to show
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
    /// Manage the categories a user follows
    Interests {
        #[command(subcommand)]
        action: InterestsAction,
    },
    /// Re-run ingestion on a fixed interval until interrupted
    Watch {
        /// Interval between runs (e.g., "1h", "30m", "6h", "1d")
        #[arg(short, long, default_value = "1h")]
        interval: String,

        /// Skip the run on start
        #[arg(long)]
        no_initial_run: bool,
    },
}

#[derive(Subcommand)]
pub enum InterestsAction {
    /// Replace a user's followed categories
    Set {
        user: String,
        #[arg(required = true)]
        categories: Vec<String>,
    },
    /// Show a user's followed categories
    Show { user: String },
}
