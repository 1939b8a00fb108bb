//! Partitioning of a query interval into shard work units.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::Region;
use crate::matching::shard::MatchQuery;
use crate::utils::validation::{check_work_unit_limit, ValidationError};

/// One shard of work: a region window of one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Location of the variant file
    pub location: String,
    pub query: MatchQuery,
}

/// Number of `size`-wide windows needed to cover `[start, end]`
pub fn window_count(start: u64, end: u64, size: u64) -> u64 {
    if size == 0 || start > end {
        return 0;
    }
    (end - start) / size + 1
}

/// Split `[start, end]` into consecutive closed windows of width `size`.
///
/// Windows never overlap and leave no gaps; the last one may be narrower.
///
/// # Errors
///
/// Returns `ValidationError` for a zero `size` or an inverted interval.
pub fn split_region(start: u64, end: u64, size: u64) -> Result<Vec<(u64, u64)>, ValidationError> {
    if size == 0 {
        return Err(ValidationError::ZeroSplitSize);
    }
    if start > end {
        return Err(ValidationError::InvertedRegion { start, end });
    }

    let mut windows = Vec::new();
    let mut first = start;
    loop {
        let last = first.saturating_add(size - 1).min(end);
        windows.push((first, last));
        if last >= end {
            break;
        }
        first = last + 1;
    }
    Ok(windows)
}

/// Enumerate one work unit per (window, source) pair.
///
/// `sources` maps each variant file location to the chromosome name it uses.
/// `build` fills in the match parameters for a window's region.
///
/// # Errors
///
/// Returns `ValidationError` for an invalid interval or when the fan-out
/// would exceed [`crate::utils::validation::MAX_WORK_UNITS`].
pub fn plan_work_units<F>(
    sources: &BTreeMap<String, String>,
    start: u64,
    end: u64,
    size: u64,
    build: F,
) -> Result<Vec<WorkUnit>, ValidationError>
where
    F: Fn(Region) -> MatchQuery,
{
    let windows = window_count(start, end, size);
    let total = usize::try_from(windows)
        .unwrap_or(usize::MAX)
        .saturating_mul(sources.len());
    check_work_unit_limit(total)?;

    let mut units = Vec::with_capacity(total);
    for (first, last) in split_region(start, end, size)? {
        for (location, chrom) in sources {
            units.push(WorkUnit {
                location: location.clone(),
                query: build(Region::new(chrom.clone(), first, last)),
            });
        }
    }
    Ok(units)
}
