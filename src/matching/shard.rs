//! Per-shard variant matching.
//!
//! A shard is one region window of one source. The matcher consumes the
//! source's records in order, keeps the records whose position lies in the
//! window, and accumulates call counts and carrier samples for every
//! alternate allele that satisfies the query.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::allele::{name_variant, normalize};
use crate::core::iupac::IupacPattern;
use crate::core::record::{allele_calls, alternate_indexes, ShardRecord};
use crate::core::types::{Region, VariantType};
use crate::matching::classifier::AlleleCriterion;
use crate::source::{RecordSource, SourceError};
use crate::utils::validation::{validate_bases, ValidationError};

/// Upper bound on distinct genotype strings memoized within one shard run
pub const GENOTYPE_CACHE_CAPACITY: usize = 65_536;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Record at position {position} has no AC entry for alternate {index}")]
    MissingAlleleCount { position: u64, index: usize },

    #[error("Record at position {position} has a non-numeric {field} value '{value}'")]
    InvalidCount {
        position: u64,
        field: &'static str,
        value: String,
    },

    #[error("Shard was cancelled")]
    Cancelled,
}

/// Cooperative cancellation flag shared between a coordinator and its shards
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Match parameters for a single shard, as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    /// Window this shard is responsible for
    pub region: Region,
    pub reference_bases: String,
    #[serde(default)]
    pub alternate_bases: Option<String>,
    #[serde(default)]
    pub variant_type: Option<VariantType>,
    pub end_min: u64,
    pub end_max: u64,
    pub include_details: bool,
}

impl MatchQuery {
    /// Validate the allele strings and fix the allele criterion.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the bases are not ambiguity codes or if
    /// neither alternate bases nor a variant type is given.
    pub fn compile(&self) -> Result<CompiledQuery, ValidationError> {
        let reference = validate_bases(&self.reference_bases)?;

        let criterion = match (&self.alternate_bases, &self.variant_type) {
            (Some(bases), _) => AlleleCriterion::Bases(validate_bases(bases)?),
            (None, Some(variant_type)) => AlleleCriterion::Type(variant_type.clone()),
            (None, None) => return Err(ValidationError::MissingAlleleCriterion),
        };

        Ok(CompiledQuery {
            approximate: reference.is_fully_degenerate() && self.variant_type.is_some(),
            reference,
            criterion,
            window: self.region.clone(),
            end_min: self.end_min,
            end_max: self.end_max,
            include_details: self.include_details,
        })
    }
}

/// A validated shard query ready for matching
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub reference: IupacPattern,
    pub criterion: AlleleCriterion,
    /// Reference `N` with a variant type: match on end position instead of bases
    pub approximate: bool,
    pub window: Region,
    pub end_min: u64,
    pub end_max: u64,
    pub include_details: bool,
}

impl CompiledQuery {
    /// Reference-side test for one normalized allele pair.
    ///
    /// Grouped as `(end in [end_min, end_max] AND approximate) OR reference
    /// compatible`, so an exact reference match does not consult the end
    /// bounds.
    pub fn reference_hit(&self, position: u64, reference: &str) -> bool {
        let end = (position + reference.len() as u64).saturating_sub(1);
        (self.approximate && self.end_min <= end && end <= self.end_max)
            || self.reference.matches(reference)
    }
}

/// Outcome of one shard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardResult {
    pub exists: bool,
    pub call_count: u64,
    pub total_allele_count: u64,
    /// Variant name → indexes of samples carrying it
    #[serde(default)]
    pub variant_samples: BTreeMap<String, BTreeSet<usize>>,
}

/// Memo of genotype string → alternate indexes, scoped to one shard run
#[derive(Debug)]
pub struct GenotypeCache {
    entries: HashMap<String, BTreeSet<usize>>,
    capacity: usize,
}

impl GenotypeCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn alternate_indexes(&mut self, genotype: &str) -> &BTreeSet<usize> {
        if !self.entries.contains_key(genotype) {
            if self.entries.len() >= self.capacity {
                self.entries.clear();
            }
            self.entries
                .insert(genotype.to_string(), alternate_indexes(genotype));
        }
        &self.entries[genotype]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for GenotypeCache {
    fn default() -> Self {
        Self::with_capacity(GENOTYPE_CACHE_CAPACITY)
    }
}

/// Stateful matcher for one shard run
pub struct ShardMatcher<'q> {
    query: &'q CompiledQuery,
    genotypes: GenotypeCache,
    cancel: CancelToken,
}

impl<'q> ShardMatcher<'q> {
    pub fn new(query: &'q CompiledQuery, cancel: CancelToken) -> Self {
        Self {
            query,
            genotypes: GenotypeCache::default(),
            cancel,
        }
    }

    /// Consume the record stream and produce the shard's result.
    ///
    /// # Errors
    ///
    /// Malformed records and count fields abort the shard. Cancellation is
    /// checked before each record.
    pub fn run<I>(mut self, records: I) -> Result<ShardResult, MatchError>
    where
        I: IntoIterator<Item = Result<ShardRecord, SourceError>>,
    {
        let mut result = ShardResult::default();
        let mut records_seen = 0usize;

        for record in records {
            if self.cancel.is_cancelled() {
                return Err(MatchError::Cancelled);
            }
            let record = record?;

            // A record is owned by exactly one window
            if !self.query.window.contains(record.position) {
                continue;
            }
            records_seen += 1;

            let pairs: Vec<(&str, &str)> = record
                .alternates
                .iter()
                .map(|alt| normalize(&record.reference, alt))
                .collect();

            let hits: BTreeSet<usize> = pairs
                .iter()
                .enumerate()
                .filter(|(_, (reference, alt))| {
                    self.query.reference_hit(record.position, reference)
                        && self.query.criterion.accepts(reference, alt)
                })
                .map(|(i, _)| i)
                .collect();
            if hits.is_empty() {
                continue;
            }

            let scanned_calls = count_calls(&record, &hits, &mut result)?;

            if result.call_count > 0 {
                if !result.exists {
                    result.exists = true;
                    if !self.query.include_details {
                        debug!(
                            "Shard {}: existence established at {}, stopping early",
                            self.query.window, record.position
                        );
                        break;
                    }
                }
                self.attribute_samples(&record, &pairs, &hits, &mut result);
            }

            // Frequency denominators are per record; alleles split across
            // co-located records are not combined.
            result.total_allele_count += match record.allele_number_field() {
                Some(value) => parse_count(record.position, "AN", value)?,
                None => scanned_calls.unwrap_or_else(|| {
                    record
                        .genotype_calls
                        .iter()
                        .map(|gt| allele_calls(gt).count() as u64)
                        .sum()
                }),
            };
        }

        debug!(
            "Shard {}: {} records in window, exists={}, calls={}, alleles={}, variants={}",
            self.query.window,
            records_seen,
            result.exists,
            result.call_count,
            result.total_allele_count,
            result.variant_samples.len()
        );

        Ok(result)
    }

    fn attribute_samples(
        &mut self,
        record: &ShardRecord,
        pairs: &[(&str, &str)],
        hits: &BTreeSet<usize>,
        result: &mut ShardResult,
    ) {
        let mut samples_by_genotype: HashMap<&str, Vec<usize>> = HashMap::new();
        for (sample, genotype) in record.genotype_calls.iter().enumerate() {
            samples_by_genotype
                .entry(genotype.as_str())
                .or_default()
                .push(sample);
        }

        for (genotype, samples) in samples_by_genotype {
            for hit in self.genotypes.alternate_indexes(genotype).intersection(hits) {
                let (reference, alt) = pairs[*hit];
                result
                    .variant_samples
                    .entry(name_variant(record.position, reference, alt))
                    .or_default()
                    .extend(samples.iter().copied());
            }
        }
    }
}

/// Add the record's matching calls to the running count.
///
/// Uses `AC` when present. Otherwise scans every genotype and returns the
/// number of calls seen so the caller can reuse it as the allele total.
fn count_calls(
    record: &ShardRecord,
    hits: &BTreeSet<usize>,
    result: &mut ShardResult,
) -> Result<Option<u64>, MatchError> {
    if let Some(field) = record.allele_counts_field() {
        let counts: Vec<&str> = field.split(',').collect();
        for &index in hits {
            let value = counts.get(index).ok_or(MatchError::MissingAlleleCount {
                position: record.position,
                index,
            })?;
            result.call_count += parse_count(record.position, "AC", value)?;
        }
        return Ok(None);
    }

    let hit_numbers: Vec<String> = hits.iter().map(|i| (i + 1).to_string()).collect();
    let mut scanned = 0u64;
    for genotype in &record.genotype_calls {
        for call in allele_calls(genotype) {
            scanned += 1;
            if hit_numbers.iter().any(|n| n == call) {
                result.call_count += 1;
            }
        }
    }
    Ok(Some(scanned))
}

fn parse_count(position: u64, field: &'static str, value: &str) -> Result<u64, MatchError> {
    value
        .trim()
        .parse()
        .map_err(|_| MatchError::InvalidCount {
            position,
            field,
            value: value.to_string(),
        })
}

/// Stream a shard's window from `source` and match it.
///
/// # Errors
///
/// Propagates source failures, malformed records and cancellation.
pub fn run_shard(
    source: &dyn RecordSource,
    query: &CompiledQuery,
    cancel: &CancelToken,
) -> Result<ShardResult, MatchError> {
    debug!("Shard {}: streaming from {}", query.window, source.location());
    let records = source.stream(&query.window)?;
    ShardMatcher::new(query, cancel.clone()).run(records)
}
