//! Command-line interface for beacon-query.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **shard**: Match one region of one variant file
//! - **query**: Run a split/dispatch/aggregate query against catalog datasets
//! - **serve**: Start the HTTP service (worker and/or coordinator)
//!
//! ## Usage
//!
//! ```text
//! # Does 1:100 A>T exist in one file?
//! beacon-query shard calls.vcf.gz --region 1:1-1000 -r A -a T
//!
//! # Frequency of deletions in a region across datasets
//! beacon-query query --catalog datasets.json --start 1000 --end 50000 -r N --variant-type DEL
//!
//! # JSON output for scripting
//! beacon-query query --catalog datasets.json --start 100 --end 100 -r A -a T --format json
//!
//! # Start a worker
//! beacon-query serve --address 0.0.0.0 --port 9000
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::EngineArgs;

pub mod query;
pub mod shard;

#[derive(Parser)]
#[command(name = "beacon-query")]
#[command(version)]
#[command(about = "Variant existence and frequency queries over sharded VCF datasets")]
#[command(
    long_about = "beacon-query answers whether a variant matching a description exists in a dataset of variant-call files, and with what frequency.\n\nLarge regions are split into fixed-width shards that run concurrently, locally or on remote workers. Results are merged, annotated, paginated and optionally cached."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match one region of one variant file
    Shard(shard::ShardArgs),

    /// Query datasets from a catalog
    Query(query::QueryArgs),

    /// Start the web server
    Serve(ServeArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Dataset catalog JSON; its variant files may be read by `/api/shard`
    #[arg(long, env = "DATASET_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Directory whose files `/api/shard` may read besides catalog sources
    #[arg(long, env = "SHARD_DATA_ROOT")]
    pub shard_root: Option<PathBuf>,

    /// Seconds before an HTTP request is abandoned
    #[arg(long, default_value = "300")]
    pub request_timeout: u64,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
