//! Parser for VCF data lines.
//!
//! Only the columns the matcher needs are kept: `POS`, `REF`, `ALT`, `INFO`
//! and the `GT` sub-field of every sample column. Header lines are handled by
//! the caller.

use crate::core::record::{parse_info, ShardRecord};
use crate::source::SourceError;

/// Minimum number of columns in a VCF data line (through `INFO`)
const MIN_COLUMNS: usize = 8;

/// Parse a VCF data line into its contig name and record.
///
/// # Errors
///
/// Returns `SourceError::Malformed` if mandatory columns are missing, the
/// position is not numeric, or the reference allele is empty.
pub fn parse_data_line(line: &str, line_num: usize) -> Result<(String, ShardRecord), SourceError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < MIN_COLUMNS {
        return Err(SourceError::Malformed {
            line: line_num,
            reason: format!(
                "expected at least {MIN_COLUMNS} columns, found {}",
                fields.len()
            ),
        });
    }

    let position: u64 = fields[1].parse().map_err(|_| SourceError::Malformed {
        line: line_num,
        reason: format!("invalid position '{}'", fields[1]),
    })?;
    if fields[3].is_empty() {
        return Err(SourceError::Malformed {
            line: line_num,
            reason: "empty reference allele".to_string(),
        });
    }

    let genotype_calls = match fields.get(8) {
        Some(format) => extract_genotypes(format, &fields[9..]),
        None => Vec::new(),
    };

    let record = ShardRecord {
        position,
        reference: fields[3].to_string(),
        alternates: fields[4].split(',').map(str::to_string).collect(),
        info: parse_info(fields[7]),
        genotype_calls,
    };
    Ok((fields[0].to_string(), record))
}

/// Pull the `GT` value out of each sample column. Missing values become `.`.
pub(crate) fn extract_genotypes(format: &str, samples: &[&str]) -> Vec<String> {
    let Some(gt_index) = format.split(':').position(|key| key == "GT") else {
        return Vec::new();
    };
    samples
        .iter()
        .map(|sample| {
            sample
                .split(':')
                .nth(gt_index)
                .unwrap_or(".")
                .to_string()
        })
        .collect()
}
