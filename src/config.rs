//! Runtime configuration shared by the `query` and `serve` commands.
//!
//! Every option is a clap flag with an environment-variable fallback:
//!
//! | Flag | Environment | Default |
//! |------|-------------|---------|
//! | `--split-size` | `SPLIT_SIZE` | 1,000,000 bp |
//! | `--max-concurrency` | `MAX_CONCURRENCY` | 64 |
//! | `--shard-timeout` | `SHARD_TIMEOUT_SECS` | 120 s |
//! | `--cache-dir` | `CACHE_DIR` | caching disabled |
//! | `--worker` | `WORKER_URLS` (comma separated) | shards run in-process |
//! | `--bcftools` | `BCFTOOLS` | VCF text is scanned directly |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::cache::{FileCacheStore, ResponseCache};
use crate::query::dispatcher::{AnyDispatcher, DispatchError, LocalDispatcher, RemoteDispatcher};
use crate::source::SourceKind;

pub const DEFAULT_SPLIT_SIZE: u64 = 1_000_000;
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;
pub const DEFAULT_SHARD_TIMEOUT: Duration = Duration::from_secs(120);

/// Fan-out limits for one orchestrated query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Width of each shard window in base pairs
    pub split_size: u64,
    /// Work units in flight at once
    pub max_concurrency: usize,
    /// Time allowed for a single work unit
    pub shard_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            split_size: DEFAULT_SPLIT_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            shard_timeout: DEFAULT_SHARD_TIMEOUT,
        }
    }
}

/// Command-line form of the engine configuration
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Shard window width in base pairs
    #[arg(long, env = "SPLIT_SIZE", default_value_t = DEFAULT_SPLIT_SIZE,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub split_size: u64,

    /// Maximum number of shards in flight
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY,
          value_parser = parse_positive)]
    pub max_concurrency: usize,

    /// Per-shard timeout in seconds
    #[arg(long = "shard-timeout", env = "SHARD_TIMEOUT_SECS", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub shard_timeout_secs: u64,

    /// Directory for cached responses (caching is off when unset)
    #[arg(long, env = "CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Worker base URL to send shards to (repeatable)
    #[arg(long = "worker", env = "WORKER_URLS", value_delimiter = ',')]
    pub workers: Vec<String>,

    /// Read variant files through this bcftools executable
    #[arg(long, env = "BCFTOOLS")]
    pub bcftools: Option<PathBuf>,
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl EngineArgs {
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            split_size: self.split_size,
            max_concurrency: self.max_concurrency,
            shard_timeout: Duration::from_secs(self.shard_timeout_secs),
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        match &self.bcftools {
            Some(binary) => SourceKind::Bcftools {
                binary: binary.clone(),
            },
            None => SourceKind::Vcf,
        }
    }

    /// Remote dispatch when workers are configured, local otherwise.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::NoWorkers` if every worker URL is blank.
    pub fn dispatcher(&self) -> Result<AnyDispatcher, DispatchError> {
        if self.workers.is_empty() {
            Ok(AnyDispatcher::Local(LocalDispatcher::new(self.source_kind())))
        } else {
            Ok(AnyDispatcher::Remote(RemoteDispatcher::new(self.workers.clone())?))
        }
    }

    pub fn cache(&self) -> ResponseCache {
        match &self.cache_dir {
            Some(dir) => ResponseCache::new(Arc::new(FileCacheStore::new(dir))),
            None => ResponseCache::disabled(),
        }
    }
}
