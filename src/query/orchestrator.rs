//! Top-level dataset query: cache lookup, split, dispatch, aggregate,
//! annotate, paginate.
//!
//! ```text
//! QueryRequest ──► cache get ──hit──────────────────────────────┐
//!                     │ miss                                    │
//!                     ▼                                         ▼
//!             plan_work_units ──► dispatch (≤ max_concurrency) ──► Aggregator
//!                                                               │
//!                          join_annotations + frequency ◄───────┘
//!                                     │
//!                          cache put (background) ──► paginate ──► DatasetResponse
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{QuerySignature, ResponseCache};
use crate::catalog::store::Dataset;
use crate::config::QueryConfig;
use crate::core::types::{IncludeDatasets, Region, VariantType};
use crate::matching::shard::{MatchError, MatchQuery, ShardResult};
use crate::query::aggregate::Aggregator;
use crate::query::annotate::{join_annotations, AnnotationSource, TsvAnnotationSource, VariantRow};
use crate::query::dispatcher::{CancelToken, DispatchError, Dispatcher};
use crate::query::frequency::{frequency, Frequency};
use crate::query::paginate::paginate;
use crate::query::splitter::{plan_work_units, WorkUnit};
use crate::utils::validation::{validate_bases, validate_bounds, ValidationError};

/// An orchestrated query against one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub reference_bases: String,
    pub region_start: u64,
    pub region_end: u64,
    pub end_min: u64,
    pub end_max: u64,
    #[serde(default)]
    pub alternate_bases: Option<String>,
    #[serde(default)]
    pub variant_type: Option<VariantType>,
    #[serde(default)]
    pub include_datasets: IncludeDatasets,
    #[serde(default)]
    pub variants_skip: usize,
    #[serde(default)]
    pub variants_max: Option<usize>,
}

impl QueryRequest {
    /// # Errors
    ///
    /// Returns `ValidationError` for invalid bases, a missing allele
    /// criterion, or inverted bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_bases(&self.reference_bases)?;
        if let Some(alt) = &self.alternate_bases {
            validate_bases(alt)?;
        }
        if self.alternate_bases.is_none() && self.variant_type.is_none() {
            return Err(ValidationError::MissingAlleleCriterion);
        }
        validate_bounds(self.region_start, self.region_end, self.end_min, self.end_max)
    }

    /// Shard parameters for one window
    pub fn shard_query(&self, region: Region) -> MatchQuery {
        MatchQuery {
            region,
            reference_bases: self.reference_bases.clone(),
            alternate_bases: self.alternate_bases.clone(),
            variant_type: self.variant_type.clone(),
            end_min: self.end_min,
            end_max: self.end_max,
            include_details: self.include_datasets.requires_details(),
        }
    }
}

/// Per-dataset answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetResponse {
    Included(Box<IncludedResponse>),
    Excluded(ExcludedResponse),
}

impl DatasetResponse {
    pub fn exists(&self) -> bool {
        match self {
            Self::Included(response) => response.exists,
            Self::Excluded(response) => response.exists,
        }
    }

    pub fn is_included(&self) -> bool {
        matches!(self, Self::Included(_))
    }
}

/// Full response for a dataset the caller asked to see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedResponse {
    /// Always `true`
    pub include: bool,
    pub dataset_id: String,
    pub exists: bool,
    /// Share of the dataset's samples carrying any matched variant
    pub frequency: Option<Frequency>,
    pub variant_count: usize,
    pub call_count: u64,
    pub sample_count: u64,
    pub total_allele_count: u64,
    pub note: Option<String>,
    pub external_url: Option<String>,
    pub info: DatasetInfo,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub description: String,
    pub name: String,
    pub dataset_sample_count: u64,
    pub variants: Vec<VariantRow>,
}

/// Existence-only response for a dataset filtered out by `include_datasets`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedResponse {
    /// Always `false`
    pub include: bool,
    pub exists: bool,
}

/// Runs dataset queries over a dispatcher
#[derive(Debug)]
pub struct Orchestrator<D> {
    dispatcher: Arc<D>,
    cache: ResponseCache,
    config: QueryConfig,
}

impl<D> Clone for Orchestrator<D> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            cache: self.cache.clone(),
            config: self.config,
        }
    }
}

impl<D: Dispatcher> Orchestrator<D> {
    pub fn new(dispatcher: D, cache: ResponseCache, config: QueryConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            cache,
            config,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Wait for background cache writes; call before a short-lived process exits
    pub async fn flush_cache(&self) {
        self.cache.flush().await;
    }

    /// Answer a query for one dataset, using the cache when possible.
    ///
    /// The cached value is the unpaginated response; the page window is
    /// applied on every call.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an invalid request. Failing shards and
    /// cache errors never fail the query.
    pub async fn split_query(
        &self,
        dataset: &Dataset,
        request: &QueryRequest,
    ) -> Result<DatasetResponse, ValidationError> {
        request.validate()?;
        let signature = QuerySignature::new(request);

        let mut response = match self.cache.get(&dataset.dataset_id, &signature).await {
            Some(response) => response,
            None => {
                let response = self.run_queries(dataset, request).await?;
                // Not awaited here; see `flush_cache`
                self.cache.put(&dataset.dataset_id, &signature, &response);
                response
            }
        };

        if let DatasetResponse::Included(included) = &mut response {
            paginate(
                &mut included.info.variants,
                request.variants_skip,
                request.variants_max,
            );
        }
        Ok(response)
    }

    /// Fan a query out over every shard of a dataset and build its response.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the fan-out is invalid or too large.
    pub async fn run_queries(
        &self,
        dataset: &Dataset,
        request: &QueryRequest,
    ) -> Result<DatasetResponse, ValidationError> {
        let units = plan_work_units(
            &dataset.vcf_locations,
            request.region_start,
            request.region_end,
            self.config.split_size,
            |region| request.shard_query(region),
        )?;
        let include_details = request.include_datasets.requires_details();
        let aggregate = self.collect(units, include_details).await;

        if !request.include_datasets.includes(aggregate.exists()) {
            return Ok(DatasetResponse::Excluded(ExcludedResponse {
                include: false,
                exists: aggregate.exists(),
            }));
        }

        let variants = annotate(dataset, &aggregate).await;
        let sample_count = aggregate.sample_count();

        Ok(DatasetResponse::Included(Box::new(IncludedResponse {
            include: true,
            dataset_id: dataset.dataset_id.clone(),
            exists: aggregate.exists(),
            frequency: frequency(sample_count, dataset.sample_count),
            variant_count: aggregate.variant_count(),
            call_count: aggregate.call_count(),
            sample_count,
            total_allele_count: aggregate.total_allele_count(),
            note: None,
            external_url: None,
            info: DatasetInfo {
                description: dataset.description.clone(),
                name: dataset.name.clone(),
                dataset_sample_count: dataset.sample_count,
                variants,
            },
            error: None,
        })))
    }

    /// Dispatch every unit and fold results as they complete.
    ///
    /// Failed and timed-out units are logged and skipped. In existence-only
    /// mode the first hit settles the answer and the remaining units are
    /// cancelled.
    async fn collect(&self, units: Vec<WorkUnit>, include_details: bool) -> Aggregator {
        let total = units.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let limit = self.config.shard_timeout;
        let mut tokens = Vec::with_capacity(total);
        let mut join_set = JoinSet::new();

        for unit in units {
            debug!("Submitting shard {} of {}", unit.query.region, unit.location);
            let cancel = CancelToken::new();
            tokens.push(cancel.clone());
            let dispatcher = Arc::clone(&self.dispatcher);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let location = unit.location.clone();
                let region = unit.query.region.clone();
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        match tokio::time::timeout(limit, dispatcher.dispatch(unit, cancel.clone()))
                            .await
                        {
                            Ok(outcome) => outcome,
                            Err(_) => {
                                cancel.cancel();
                                Err(DispatchError::Timeout(limit))
                            }
                        }
                    }
                    Err(_) => Err(DispatchError::Match(MatchError::Cancelled)),
                };
                (location, region, outcome)
            });
        }

        let mut aggregate = Aggregator::new(include_details);
        let mut processed = 0usize;

        while let Some(joined) = join_set.join_next().await {
            processed += 1;
            match joined {
                Ok((location, _, Ok(result))) => merge(&mut aggregate, &location, result),
                Ok((location, region, Err(e))) => {
                    warn!("Shard {region} of {location} failed, ignoring: {e}");
                }
                Err(e) => warn!("Shard task failed, ignoring: {e}"),
            }

            if aggregate.is_settled() {
                info!(
                    "Variant found after {processed} of {total} shards, cancelling the rest"
                );
                for token in &tokens {
                    token.cancel();
                }
                join_set.abort_all();
                break;
            }
        }

        aggregate
    }
}

fn merge(aggregate: &mut Aggregator, location: &str, result: ShardResult) {
    debug!(
        "Shard of {} returned exists={} calls={}",
        location, result.exists, result.call_count
    );
    aggregate.merge(location, result);
}

/// Annotate the matched variants off the async executor
async fn annotate(dataset: &Dataset, aggregate: &Aggregator) -> Vec<VariantRow> {
    let counts = aggregate.variant_sample_counts();
    let total = dataset.sample_count;
    let source = dataset
        .annotation_location
        .as_ref()
        .map(TsvAnnotationSource::new);

    let task_counts = counts.clone();
    let joined = tokio::task::spawn_blocking(move || {
        join_annotations(
            source.as_ref().map(|s| s as &dyn AnnotationSource),
            &task_counts,
            total,
        )
    })
    .await;

    match joined {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Annotation task failed, continuing without annotations: {e}");
            join_annotations(None, &counts, total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers every unit from a fixed table keyed by (location, window start)
    struct ScriptedDispatcher {
        results: BTreeMap<(String, u64), Result<ShardResult, String>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedDispatcher {
        fn new(results: Vec<((&str, u64), Result<ShardResult, String>)>) -> Self {
            Self {
                results: results
                    .into_iter()
                    .map(|((location, start), result)| ((location.to_string(), start), result))
                    .collect(),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }
    }

    impl Dispatcher for ScriptedDispatcher {
        async fn dispatch(
            &self,
            unit: WorkUnit,
            _cancel: CancelToken,
        ) -> Result<ShardResult, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.results.get(&(unit.location, unit.query.region.start)) {
                Some(Ok(result)) => Ok(result.clone()),
                Some(Err(_)) => Err(DispatchError::NoWorkers),
                None => Ok(ShardResult::default()),
            }
        }
    }

    fn hit(variants: &[(&str, &[usize])]) -> ShardResult {
        ShardResult {
            exists: true,
            call_count: variants.iter().map(|(_, s)| s.len() as u64).sum(),
            total_allele_count: 20,
            variant_samples: variants
                .iter()
                .map(|(name, samples)| {
                    (name.to_string(), samples.iter().copied().collect::<BTreeSet<_>>())
                })
                .collect(),
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            dataset_id: "ds1".to_string(),
            name: "Dataset one".to_string(),
            description: "Test".to_string(),
            sample_count: 10,
            vcf_locations: [
                ("a.vcf".to_string(), "1".to_string()),
                ("b.vcf".to_string(), "1".to_string()),
            ]
            .into(),
            annotation_location: None,
        }
    }

    fn request(include: IncludeDatasets) -> QueryRequest {
        QueryRequest {
            reference_bases: "A".to_string(),
            region_start: 1,
            region_end: 300,
            end_min: 1,
            end_max: 300,
            alternate_bases: Some("T".to_string()),
            variant_type: None,
            include_datasets: include,
            variants_skip: 0,
            variants_max: None,
        }
    }

    fn config() -> QueryConfig {
        QueryConfig {
            split_size: 100,
            max_concurrency: 2,
            shard_timeout: Duration::from_secs(5),
        }
    }

    fn included(response: DatasetResponse) -> IncludedResponse {
        match response {
            DatasetResponse::Included(response) => *response,
            DatasetResponse::Excluded(_) => panic!("expected an included response"),
        }
    }

    #[tokio::test]
    async fn test_aggregates_across_shards() {
        let dispatcher = ScriptedDispatcher::new(vec![
            (("a.vcf", 1), Ok(hit(&[("50A>T", &[0, 1])]))),
            (("a.vcf", 201), Ok(hit(&[("50A>T", &[2, 3]), ("250A>T", &[1])]))),
            (("b.vcf", 101), Err("boom".to_string())),
        ]);
        let orchestrator = Orchestrator::new(dispatcher, ResponseCache::disabled(), config());

        let response = included(
            orchestrator
                .split_query(&dataset(), &request(IncludeDatasets::Hit))
                .await
                .unwrap(),
        );

        assert_eq!(orchestrator.dispatcher().calls.load(Ordering::SeqCst), 6);
        assert!(response.exists);
        assert_eq!(response.variant_count, 2);
        assert_eq!(response.call_count, 5);
        assert_eq!(response.sample_count, 4);
        assert_eq!(response.total_allele_count, 40);
        assert_eq!(response.frequency, Some(Frequency::Whole(40)));

        let positions: Vec<u64> = response.info.variants.iter().map(|v| v.pos).collect();
        assert_eq!(positions, vec![50, 250]);
        assert_eq!(response.info.variants[0].sample_count, 4);
        assert_eq!(response.info.dataset_sample_count, 10);
    }

    #[tokio::test]
    async fn test_miss_with_hits_is_excluded() {
        let dispatcher = ScriptedDispatcher::new(vec![(("a.vcf", 1), Ok(hit(&[("50A>T", &[0])])))]);
        let orchestrator = Orchestrator::new(dispatcher, ResponseCache::disabled(), config());

        let response = orchestrator
            .split_query(&dataset(), &request(IncludeDatasets::Miss))
            .await
            .unwrap();
        assert_eq!(
            response,
            DatasetResponse::Excluded(ExcludedResponse {
                include: false,
                exists: true
            })
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"include": false, "exists": true})
        );
    }

    #[tokio::test]
    async fn test_miss_without_hits_is_included() {
        let orchestrator = Orchestrator::new(
            ScriptedDispatcher::new(vec![]),
            ResponseCache::disabled(),
            config(),
        );
        let response = included(
            orchestrator
                .split_query(&dataset(), &request(IncludeDatasets::Miss))
                .await
                .unwrap(),
        );
        assert!(!response.exists);
        assert_eq!(response.sample_count, 0);
        assert_eq!(response.frequency, Some(Frequency::Whole(0)));
        assert!(response.info.variants.is_empty());
    }

    #[tokio::test]
    async fn test_hit_without_matches_is_excluded() {
        let orchestrator = Orchestrator::new(
            ScriptedDispatcher::new(vec![]),
            ResponseCache::disabled(),
            config(),
        );
        let response = orchestrator
            .split_query(&dataset(), &request(IncludeDatasets::Hit))
            .await
            .unwrap();
        assert!(!response.is_included());
        assert!(!response.exists());
    }

    #[tokio::test]
    async fn test_existence_only_stops_early() {
        let mut dispatcher =
            ScriptedDispatcher::new(vec![(("a.vcf", 1), Ok(hit(&[("50A>T", &[0])])))]);
        dispatcher.delay = Some(Duration::from_millis(10));
        let mut config = config();
        config.max_concurrency = 1;
        config.split_size = 1;
        let orchestrator = Orchestrator::new(dispatcher, ResponseCache::disabled(), config);

        let response = orchestrator
            .split_query(&dataset(), &request(IncludeDatasets::Miss))
            .await
            .unwrap();
        assert!(response.exists());
        // 600 units planned; the first completes with a hit
        assert!(orchestrator.dispatcher().calls.load(Ordering::SeqCst) < 600);
    }

    #[tokio::test]
    async fn test_timed_out_units_are_ignored() {
        let mut dispatcher =
            ScriptedDispatcher::new(vec![(("a.vcf", 1), Ok(hit(&[("50A>T", &[0])])))]);
        dispatcher.delay = Some(Duration::from_secs(60));
        let mut config = config();
        config.shard_timeout = Duration::from_millis(20);
        config.max_concurrency = 16;
        let orchestrator = Orchestrator::new(dispatcher, ResponseCache::disabled(), config);

        let response = orchestrator
            .split_query(&dataset(), &request(IncludeDatasets::All))
            .await
            .unwrap();
        let response = included(response);
        assert!(!response.exists);
        assert_eq!(response.call_count, 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_dispatch_and_repaginates() {
        let store = Arc::new(MemoryCacheStore::new());
        let dispatcher = ScriptedDispatcher::new(vec![
            (("a.vcf", 1), Ok(hit(&[("50A>T", &[0]), ("20A>T", &[1])]))),
            (("b.vcf", 201), Ok(hit(&[("250A>T", &[0])]))),
        ]);
        let orchestrator = Orchestrator::new(dispatcher, ResponseCache::new(store.clone()), config());

        let first = orchestrator
            .split_query(&dataset(), &request(IncludeDatasets::Hit))
            .await
            .unwrap();
        assert_eq!(included(first).info.variants.len(), 3);

        orchestrator.flush_cache().await;
        assert_eq!(store.len(), 1);
        let calls = orchestrator.dispatcher().calls.load(Ordering::SeqCst);

        let mut paged = request(IncludeDatasets::Hit);
        paged.variants_skip = 1;
        paged.variants_max = Some(1);
        let second = included(orchestrator.split_query(&dataset(), &paged).await.unwrap());

        assert_eq!(orchestrator.dispatcher().calls.load(Ordering::SeqCst), calls);
        assert_eq!(second.variant_count, 3);
        let positions: Vec<u64> = second.info.variants.iter().map(|v| v.pos).collect();
        assert_eq!(positions, vec![50]);
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let orchestrator = Orchestrator::new(
            ScriptedDispatcher::new(vec![]),
            ResponseCache::disabled(),
            config(),
        );
        let mut bad = request(IncludeDatasets::Hit);
        bad.alternate_bases = None;
        assert!(matches!(
            orchestrator.split_query(&dataset(), &bad).await,
            Err(ValidationError::MissingAlleleCriterion)
        ));

        let mut inverted = request(IncludeDatasets::Hit);
        inverted.region_start = 500;
        assert!(matches!(
            orchestrator.split_query(&dataset(), &inverted).await,
            Err(ValidationError::InvertedRegion { .. })
        ));
    }

    #[test]
    fn test_included_json_shape() {
        let response = IncludedResponse {
            include: true,
            dataset_id: "ds1".to_string(),
            exists: true,
            frequency: Some(Frequency::Decimal(0.04)),
            variant_count: 0,
            call_count: 1,
            sample_count: 1,
            total_allele_count: 5008,
            note: None,
            external_url: None,
            info: DatasetInfo {
                description: String::new(),
                name: "n".to_string(),
                dataset_sample_count: 2504,
                variants: Vec::new(),
            },
            error: None,
        };
        let json = serde_json::to_value(DatasetResponse::Included(Box::new(response.clone()))).unwrap();
        assert_eq!(json["include"], true);
        assert_eq!(json["datasetId"], "ds1");
        assert_eq!(json["frequency"], 0.04);
        assert_eq!(json["info"]["datasetSampleCount"], 2504);
        assert!(json["externalUrl"].is_null());

        let back: DatasetResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, DatasetResponse::Included(Box::new(response)));
    }
}
