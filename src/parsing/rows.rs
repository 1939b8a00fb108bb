//! Parser for tab-delimited variant rows.
//!
//! Each row has five columns, as printed by
//! `bcftools query --format '%POS\t%REF\t%ALT\t%INFO\t[%GT,]\n'`:
//!
//! ```text
//! 12345	A	T,C	AC=3,1;AN=10	0/1,1/1,0/2,0/0,./.,
//! ```
//!
//! The genotype column is comma-separated with a trailing comma.

use crate::core::record::{parse_info, ShardRecord};
use crate::source::SourceError;

/// `bcftools query` format string producing this row layout
pub const ROW_FORMAT: &str = "%POS\t%REF\t%ALT\t%INFO\t[%GT,]\n";

/// Parse one row. `line_num` is 1-based and only used for error messages.
///
/// # Errors
///
/// Returns `SourceError::Malformed` if the column count is wrong, the position
/// is not a number, or the reference allele is empty.
pub fn parse_row(line: &str, line_num: usize) -> Result<ShardRecord, SourceError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 5 {
        return Err(SourceError::Malformed {
            line: line_num,
            reason: format!("expected 5 tab-separated columns, found {}", fields.len()),
        });
    }

    let position: u64 = fields[0].parse().map_err(|_| SourceError::Malformed {
        line: line_num,
        reason: format!("invalid position '{}'", fields[0]),
    })?;

    let reference = fields[1];
    if reference.is_empty() {
        return Err(SourceError::Malformed {
            line: line_num,
            reason: "empty reference allele".to_string(),
        });
    }

    let alternates = fields[2].split(',').map(str::to_string).collect();
    let genotype_calls = split_genotypes(fields[4]);

    Ok(ShardRecord {
        position,
        reference: reference.to_string(),
        alternates,
        info: parse_info(fields[3]),
        genotype_calls,
    })
}

fn split_genotypes(column: &str) -> Vec<String> {
    let column = column.strip_suffix(',').unwrap_or(column);
    if column.is_empty() {
        return Vec::new();
    }
    column.split(',').map(str::to_string).collect()
}
