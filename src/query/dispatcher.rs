//! Execution of work units.
//!
//! A [`Dispatcher`] runs one shard and returns its [`ShardResult`]. Two
//! implementations are provided:
//!
//! | Dispatcher | Where the shard runs |
//! |------------|----------------------|
//! | [`LocalDispatcher`] | tokio's blocking pool in this process |
//! | [`RemoteDispatcher`] | a worker's `/api/shard` endpoint, chosen round-robin |
//!
//! Every unit carries a [`CancelToken`]. Local shards check it between
//! records; remote requests are dropped when the coordinator aborts the task.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::matching::shard::{run_shard, MatchError, ShardResult};
use crate::query::splitter::WorkUnit;
use crate::source::SourceKind;
use crate::utils::validation::{validate_location, ValidationError};

pub use crate::matching::shard::CancelToken;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid shard query: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Shard task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Worker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker {url} returned {status}: {body}")]
    Worker {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Shard timed out after {0:?}")]
    Timeout(Duration),

    #[error("No worker URLs configured")]
    NoWorkers,
}

/// Runs one work unit to completion
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        unit: WorkUnit,
        cancel: CancelToken,
    ) -> impl Future<Output = Result<ShardResult, DispatchError>> + Send;
}

/// Run a work unit on the current thread.
///
/// This is the body of both the local dispatcher and the `/api/shard`
/// endpoint.
///
/// # Errors
///
/// Returns `DispatchError` if the query is invalid or the shard fails.
pub fn execute_unit(
    kind: &SourceKind,
    unit: &WorkUnit,
    cancel: &CancelToken,
) -> Result<ShardResult, DispatchError> {
    validate_location(&unit.location)?;
    let query = unit.query.compile()?;
    let source = kind.open(&unit.location);
    Ok(run_shard(source.as_ref(), &query, cancel)?)
}

/// Runs shards in-process on the blocking thread pool
#[derive(Debug, Clone, Default)]
pub struct LocalDispatcher {
    kind: SourceKind,
}

impl LocalDispatcher {
    pub fn new(kind: SourceKind) -> Self {
        Self { kind }
    }
}

impl Dispatcher for LocalDispatcher {
    async fn dispatch(
        &self,
        unit: WorkUnit,
        cancel: CancelToken,
    ) -> Result<ShardResult, DispatchError> {
        let kind = self.kind.clone();
        tokio::task::spawn_blocking(move || execute_unit(&kind, &unit, &cancel)).await?
    }
}

/// Sends shards to remote workers over HTTP
#[derive(Debug)]
pub struct RemoteDispatcher {
    client: reqwest::Client,
    workers: Vec<String>,
    next: AtomicUsize,
}

impl RemoteDispatcher {
    /// Create a dispatcher over the given worker base URLs.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::NoWorkers` for an empty list.
    pub fn new(workers: Vec<String>) -> Result<Self, DispatchError> {
        Self::with_client(reqwest::Client::new(), workers)
    }

    /// # Errors
    ///
    /// Returns `DispatchError::NoWorkers` for an empty list.
    pub fn with_client(client: reqwest::Client, workers: Vec<String>) -> Result<Self, DispatchError> {
        let workers: Vec<String> = workers
            .into_iter()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if workers.is_empty() {
            return Err(DispatchError::NoWorkers);
        }
        Ok(Self {
            client,
            workers,
            next: AtomicUsize::new(0),
        })
    }

    /// Shard endpoint of the next worker in rotation
    fn next_endpoint(&self) -> String {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        format!("{}/api/shard", self.workers[index])
    }
}

impl Dispatcher for RemoteDispatcher {
    async fn dispatch(
        &self,
        unit: WorkUnit,
        _cancel: CancelToken,
    ) -> Result<ShardResult, DispatchError> {
        let url = self.next_endpoint();
        debug!("Sending shard {} of {} to {}", unit.query.region, unit.location, url);

        let response = self.client.post(&url).json(&unit).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Worker { url, status, body });
        }
        Ok(response.json::<ShardResult>().await?)
    }
}

/// Dispatcher selected at startup
#[derive(Debug)]
pub enum AnyDispatcher {
    Local(LocalDispatcher),
    Remote(RemoteDispatcher),
}

impl Dispatcher for AnyDispatcher {
    async fn dispatch(
        &self,
        unit: WorkUnit,
        cancel: CancelToken,
    ) -> Result<ShardResult, DispatchError> {
        match self {
            Self::Local(dispatcher) => dispatcher.dispatch(unit, cancel).await,
            Self::Remote(dispatcher) => dispatcher.dispatch(unit, cancel).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Region;
    use crate::matching::shard::MatchQuery;
    use std::io::Write;

    fn unit(location: &str) -> WorkUnit {
        WorkUnit {
            location: location.to_string(),
            query: MatchQuery {
                region: Region::new("1", 1, 1000),
                reference_bases: "A".to_string(),
                alternate_bases: Some("T".to_string()),
                variant_type: None,
                end_min: 1,
                end_max: 1000,
                include_details: true,
            },
        }
    }

    #[tokio::test]
    async fn test_local_dispatch() {
        let mut file = tempfile::NamedTempFile::with_suffix(".vcf").unwrap();
        writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2").unwrap();
        writeln!(file, "1\t100\t.\tA\tT\t.\t.\t.\tGT\t0/1\t0/0").unwrap();

        let dispatcher = LocalDispatcher::default();
        let result = dispatcher
            .dispatch(unit(&file.path().to_string_lossy()), CancelToken::new())
            .await
            .unwrap();
        assert!(result.exists);
        assert_eq!(result.call_count, 1);
        assert_eq!(result.variant_samples["100A>T"].len(), 1);
    }

    #[tokio::test]
    async fn test_local_dispatch_missing_file() {
        let dispatcher = AnyDispatcher::Local(LocalDispatcher::default());
        let result = dispatcher
            .dispatch(unit("/nonexistent/file.vcf"), CancelToken::new())
            .await;
        assert!(matches!(result, Err(DispatchError::Match(_))));
    }

    #[tokio::test]
    async fn test_invalid_unit() {
        let mut bad = unit("/nonexistent/file.vcf");
        bad.query.reference_bases = "XYZ".to_string();
        let result = LocalDispatcher::default()
            .dispatch(bad, CancelToken::new())
            .await;
        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_option_like_location_is_rejected() {
        let kind = SourceKind::Bcftools {
            binary: "bcftools".into(),
        };
        let result = LocalDispatcher::new(kind)
            .dispatch(unit("-o/tmp/overwritten"), CancelToken::new())
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::Validation(ValidationError::InvalidLocation))
        ));
    }

    #[test]
    fn test_remote_round_robin() {
        let dispatcher = RemoteDispatcher::new(vec![
            "http://a:8080/".to_string(),
            "http://b:8080".to_string(),
        ])
        .unwrap();
        assert_eq!(dispatcher.next_endpoint(), "http://a:8080/api/shard");
        assert_eq!(dispatcher.next_endpoint(), "http://b:8080/api/shard");
        assert_eq!(dispatcher.next_endpoint(), "http://a:8080/api/shard");
    }

    #[test]
    fn test_remote_requires_workers() {
        assert!(matches!(
            RemoteDispatcher::new(vec![" ".to_string()]),
            Err(DispatchError::NoWorkers)
        ));
    }
}
