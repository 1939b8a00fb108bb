//! Tab-delimited variant annotation tables.
//!
//! The first line is a header naming the columns. The `Variant` column holds
//! the variant name (`{pos}{ref}>{alt}`) a row annotates; every other column
//! is an optional metadata field.
//!
//! ```text
//! Variant     SIFT_score  Gene
//! 100A>T      0.02        BRCA2
//! 250GT>G     .           BRCA2
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;

use crate::utils::io::open_text;

/// Column holding the join key
pub const VARIANT_COLUMN: &str = "Variant";

/// Values treated as absent
const PLACEHOLDERS: [&str; 2] = [".", ""];

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Annotation table has no header row")]
    MissingHeader,

    #[error("Annotation header has no '{VARIANT_COLUMN}' column")]
    MissingVariantColumn,
}

/// One annotation row restricted to the requested fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRow {
    pub variant: String,
    pub fields: BTreeMap<String, String>,
}

/// Read the rows for `wanted` variants from an annotation file.
///
/// # Errors
///
/// Returns `AnnotationError` if the file cannot be read or has no usable header.
pub fn read_annotation_file(
    path: &Path,
    wanted: &BTreeSet<String>,
    allowed_fields: &[&str],
) -> Result<Vec<AnnotationRow>, AnnotationError> {
    read_annotations(open_text(path)?, wanted, allowed_fields)
}

/// Read the rows for `wanted` variants from an annotation table.
///
/// Only columns named in `allowed_fields` are kept, and placeholder values
/// (`.` or empty) are dropped. The first row for a variant wins; later
/// duplicates are ignored.
///
/// # Errors
///
/// Returns `AnnotationError` on read failure or a missing header / `Variant` column.
pub fn read_annotations<R: BufRead>(
    reader: R,
    wanted: &BTreeSet<String>,
    allowed_fields: &[&str],
) -> Result<Vec<AnnotationRow>, AnnotationError> {
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(AnnotationError::MissingHeader),
    };
    let columns: Vec<&str> = header.trim_end_matches('\r').split('\t').collect();
    let variant_index = columns
        .iter()
        .position(|c| *c == VARIANT_COLUMN)
        .ok_or(AnnotationError::MissingVariantColumn)?;

    // (column index, name) pairs worth copying
    let kept: Vec<(usize, &str)> = columns
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != variant_index && allowed_fields.contains(name))
        .map(|(i, name)| (i, *name))
        .collect();

    let mut rows = Vec::new();
    let mut seen = BTreeSet::new();

    for line in lines {
        let line = line?;
        let values: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
        let Some(variant) = values.get(variant_index) else {
            continue;
        };
        if !wanted.contains(*variant) || !seen.insert((*variant).to_string()) {
            continue;
        }

        let fields = kept
            .iter()
            .filter_map(|(i, name)| {
                let value = values.get(*i)?;
                (!PLACEHOLDERS.contains(value)).then(|| ((*name).to_string(), (*value).to_string()))
            })
            .collect();

        rows.push(AnnotationRow {
            variant: (*variant).to_string(),
            fields,
        });
    }

    Ok(rows)
}
