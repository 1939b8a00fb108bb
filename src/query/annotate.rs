//! Joins external annotation rows onto the matched variants.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::allele::VariantName;
pub use crate::parsing::annotations::{AnnotationError, AnnotationRow};
use crate::parsing::annotations::read_annotation_file;
use crate::query::frequency::{frequency, Frequency};

/// Annotation columns copied into the response (besides the `Variant` key)
pub const ANNOTATION_FIELDS: [&str; 1] = ["SIFT_score"];

/// Looks up metadata rows by variant name
pub trait AnnotationSource: Send + Sync {
    /// Rows for any of `variants` the source knows about.
    ///
    /// # Errors
    ///
    /// Returns `AnnotationError` if the source cannot be read.
    fn lookup(&self, variants: &BTreeSet<String>) -> Result<Vec<AnnotationRow>, AnnotationError>;
}

/// Annotation table in a plain or gzipped TSV file
#[derive(Debug, Clone)]
pub struct TsvAnnotationSource {
    path: PathBuf,
}

impl TsvAnnotationSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AnnotationSource for TsvAnnotationSource {
    fn lookup(&self, variants: &BTreeSet<String>) -> Result<Vec<AnnotationRow>, AnnotationError> {
        read_annotation_file(&self.path, variants, &ANNOTATION_FIELDS)
    }
}

/// One entry of the response's variant list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRow {
    pub pos: u64,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "alt")]
    pub alternate: String,
    pub sample_count: u64,
    pub frequency: Option<Frequency>,
    /// Copied annotation fields, e.g. `SIFT_score`
    #[serde(flatten)]
    pub annotations: BTreeMap<String, String>,
}

/// Build the variant list for a dataset.
///
/// `sample_counts` maps every matched variant name to its sample count; each
/// appears exactly once in the output. Annotated variants come first in table
/// order, followed by the rest in name order. A failing source is treated as
/// having no annotations.
pub fn join_annotations(
    source: Option<&dyn AnnotationSource>,
    sample_counts: &BTreeMap<String, u64>,
    dataset_sample_count: u64,
) -> Vec<VariantRow> {
    let mut annotated = Vec::new();
    if let Some(source) = source {
        if !sample_counts.is_empty() {
            let names: BTreeSet<String> = sample_counts.keys().cloned().collect();
            match source.lookup(&names) {
                Ok(rows) => annotated = rows,
                Err(e) => warn!("Annotation lookup failed, continuing without annotations: {e}"),
            }
        }
    }
    debug!(
        "{} of {} variants annotated",
        annotated.len(),
        sample_counts.len()
    );

    let mut covered = BTreeSet::new();
    let mut rows = Vec::with_capacity(sample_counts.len());

    for row in annotated {
        let Some(&count) = sample_counts.get(&row.variant) else {
            continue;
        };
        if covered.insert(row.variant.clone()) {
            rows.extend(variant_row(&row.variant, count, dataset_sample_count, row.fields));
        }
    }
    for (variant, &count) in sample_counts {
        if !covered.contains(variant) {
            rows.extend(variant_row(variant, count, dataset_sample_count, BTreeMap::new()));
        }
    }

    rows
}

fn variant_row(
    variant: &str,
    sample_count: u64,
    dataset_sample_count: u64,
    annotations: BTreeMap<String, String>,
) -> Option<VariantRow> {
    let Some(name) = VariantName::parse(variant) else {
        warn!("Skipping unparseable variant name '{variant}'");
        return None;
    };
    Some(VariantRow {
        pos: name.position,
        reference: name.reference,
        alternate: name.alternate,
        sample_count,
        frequency: frequency(sample_count, dataset_sample_count),
        annotations,
    })
}
