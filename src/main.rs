use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cache;
mod catalog;
mod cli;
mod config;
mod core;
mod matching;
mod parsing;
mod query;
mod source;
mod utils;
mod web;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("beacon_query=debug,info")
    } else {
        EnvFilter::new("beacon_query=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Shard(args) => {
            cli::shard::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Query(args) => {
            cli::query::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Serve(args) => {
            web::server::run(args)?;
        }
    }

    Ok(())
}
