//! Allele normalization and variant naming.

use std::fmt;

use crate::core::iupac::is_code_string;

/// True for bracketed structural-variant alleles such as `<DEL>` or `<CN2>`
#[inline]
pub fn is_symbolic(alt: &str) -> bool {
    alt.starts_with('<')
}

/// Strip the shared trailing bases of a reference/alternate pair.
///
/// Only applies when `alt` is a plain ambiguity-code sequence. At least one
/// base is kept in the shorter allele, so neither side becomes empty.
pub fn normalize<'a>(reference: &'a str, alt: &'a str) -> (&'a str, &'a str) {
    if !is_code_string(alt) {
        return (reference, alt);
    }

    let max_trim = reference.len().min(alt.len()).saturating_sub(1);
    let trim = reference
        .bytes()
        .rev()
        .zip(alt.bytes().rev())
        .take(max_trim)
        .take_while(|(r, a)| r == a)
        .count();

    (
        &reference[..reference.len() - trim],
        &alt[..alt.len() - trim],
    )
}

/// Canonical identifier for a normalized `(position, ref, alt)` triple,
/// rendered as `{position}{ref}>{alt}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantName {
    pub position: u64,
    pub reference: String,
    pub alternate: String,
}

impl VariantName {
    pub fn new(position: u64, reference: impl Into<String>, alternate: impl Into<String>) -> Self {
        Self {
            position,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }

    /// Parse `{digits}{ref}>{alt}`.
    ///
    /// The split is at the last `>` that still leaves a non-empty alternate,
    /// so symbolic alternates like `<DEL>` survive the round trip.
    pub fn parse(name: &str) -> Option<Self> {
        let digits = name.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let position = name[..digits].parse().ok()?;
        let rest = &name[digits..];
        let (last, _) = rest.char_indices().last()?;

        let separator = rest[..last].rfind('>')?;
        if separator == 0 {
            return None;
        }
        Some(Self {
            position,
            reference: rest[..separator].to_string(),
            alternate: rest[separator + 1..].to_string(),
        })
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}>{}", self.position, self.reference, self.alternate)
    }
}

/// Build the string form of a variant name directly
pub fn name_variant(position: u64, reference: &str, alternate: &str) -> String {
    format!("{position}{reference}>{alternate}")
}
