//! Merging of shard results into one dataset-level answer.
//!
//! Every merge operation is a union, an OR, or a sum, so the outcome does not
//! depend on the order in which shards complete.

use std::collections::{BTreeMap, BTreeSet};

use crate::matching::shard::ShardResult;

/// Running total for one dataset query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregator {
    include_details: bool,
    exists: bool,
    call_count: u64,
    total_allele_count: u64,
    /// Variant name → source location → sample indexes
    variants: BTreeMap<String, BTreeMap<String, BTreeSet<usize>>>,
    /// Source location → indexes of samples carrying any matched variant
    source_samples: BTreeMap<String, BTreeSet<usize>>,
}

impl Aggregator {
    pub fn new(include_details: bool) -> Self {
        Self {
            include_details,
            ..Self::default()
        }
    }

    /// Fold in the result of one shard read from `location`.
    ///
    /// Shards that found nothing contribute nothing. Counts and samples are
    /// only kept when details were requested.
    pub fn merge(&mut self, location: &str, result: ShardResult) {
        if !result.exists {
            return;
        }
        self.exists = true;
        if !self.include_details {
            return;
        }

        self.call_count += result.call_count;
        self.total_allele_count += result.total_allele_count;
        for (variant, samples) in result.variant_samples {
            self.source_samples
                .entry(location.to_string())
                .or_default()
                .extend(samples.iter().copied());
            self.variants
                .entry(variant)
                .or_default()
                .entry(location.to_string())
                .or_default()
                .extend(samples);
        }
    }

    /// No further shard can change the answer
    pub fn is_settled(&self) -> bool {
        self.exists && !self.include_details
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    pub fn total_allele_count(&self) -> u64 {
        self.total_allele_count
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Distinct samples carrying any matched variant, counted per source
    pub fn sample_count(&self) -> u64 {
        self.source_samples.values().map(|s| s.len() as u64).sum()
    }

    /// Per-variant sample counts, summed over sources
    pub fn variant_sample_counts(&self) -> BTreeMap<String, u64> {
        self.variants
            .iter()
            .map(|(name, sources)| {
                let count = sources.values().map(|s| s.len() as u64).sum();
                (name.clone(), count)
            })
            .collect()
    }
}
