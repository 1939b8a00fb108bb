//! Structural variant classification of normalized allele pairs.
//!
//! Literal alleles are judged by length and repeat structure relative to the
//! reference. The repeat checks only see the bases inside the record, so
//! duplications that need flanking sequence to be recognised are missed.

use crate::core::allele::is_symbolic;
use crate::core::iupac::IupacPattern;
use crate::core::types::VariantType;

/// What an alternate allele is tested against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlleleCriterion {
    /// Literal alternate must be ambiguity-compatible with these bases
    Bases(IupacPattern),
    /// Alternate must qualify as this structural variant type
    Type(VariantType),
}

impl AlleleCriterion {
    /// Decide whether a normalized `(reference, alt)` pair satisfies the criterion
    pub fn accepts(&self, reference: &str, alt: &str) -> bool {
        match self {
            Self::Bases(pattern) => pattern.matches(alt),
            Self::Type(variant_type) => classify(variant_type, reference, alt),
        }
    }
}

/// Decide membership of a normalized pair in a structural variant type
pub fn classify(variant_type: &VariantType, reference: &str, alt: &str) -> bool {
    if is_symbolic(alt) {
        return symbolic_matches(variant_type, alt);
    }

    match variant_type {
        VariantType::Del => alt.len() < reference.len(),
        VariantType::Ins => alt.len() > reference.len(),
        VariantType::Dup => repeat_count(reference, alt).is_some_and(|n| n >= 2),
        VariantType::DupTandem => {
            alt.len() == 2 * reference.len() && alt.starts_with(reference) && alt.ends_with(reference)
        }
        VariantType::Cnv => alt == "." || repeat_count(reference, alt).is_some(),
        VariantType::Other(_) => false,
    }
}

fn symbolic_matches(variant_type: &VariantType, alt: &str) -> bool {
    if alt.starts_with(&variant_type.symbolic_prefix()) {
        return true;
    }

    match variant_type {
        VariantType::Del => alt == "<CN0>",
        VariantType::Dup => alt.starts_with("<CN") && alt != "<CN0>" && alt != "<CN1>",
        VariantType::DupTandem => alt == "<CN2>",
        VariantType::Cnv => {
            alt.starts_with("<CN") || alt.starts_with("<DEL") || alt.starts_with("<DUP")
        }
        VariantType::Ins | VariantType::Other(_) => false,
    }
}

/// Number of contiguous copies of `unit` that make up `alt` exactly.
///
/// The empty string is zero copies; `None` means `alt` is not a pure repeat.
fn repeat_count(unit: &str, alt: &str) -> Option<usize> {
    if alt.is_empty() {
        return Some(0);
    }
    if unit.is_empty() || alt.len() % unit.len() != 0 {
        return None;
    }
    let unit = unit.as_bytes();
    alt.as_bytes()
        .chunks(unit.len())
        .all(|chunk| chunk == unit)
        .then_some(alt.len() / unit.len())
}
