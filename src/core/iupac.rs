//! IUPAC nucleotide ambiguity codes.
//!
//! Each code is stored as a 4-bit mask over the literal bases `A`, `C`, `G`
//! and `T` (`U` is an alias of `T`). Two codes are compatible when their masks
//! intersect, which gives the symmetric relation used for reference and
//! alternate matching.

use std::fmt;

const BITMASK_A: u8 = 1;
const BITMASK_C: u8 = 2;
const BITMASK_G: u8 = 4;
const BITMASK_T: u8 = 8;
const BITMASK_N: u8 = BITMASK_A | BITMASK_C | BITMASK_G | BITMASK_T;

/// The 16 recognised code letters, in table order.
pub const CODE_LETTERS: [u8; 16] = [
    b'A', b'C', b'G', b'T', b'U', b'M', b'R', b'W', b'S', b'Y', b'K', b'V', b'H', b'D', b'B', b'N',
];

/// A single ambiguity code as a bitmask of literal bases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmbiguityCode(u8);

impl AmbiguityCode {
    /// The fully degenerate code, compatible with every other code
    pub const N: Self = Self(BITMASK_N);

    /// Look up an uppercase code letter. Lowercase letters are not codes.
    #[inline]
    pub fn from_letter(letter: u8) -> Option<Self> {
        let mask = match letter {
            b'A' => BITMASK_A,
            b'C' => BITMASK_C,
            b'G' => BITMASK_G,
            b'T' | b'U' => BITMASK_T,
            b'M' => BITMASK_A | BITMASK_C,
            b'R' => BITMASK_A | BITMASK_G,
            b'W' => BITMASK_A | BITMASK_T,
            b'S' => BITMASK_C | BITMASK_G,
            b'Y' => BITMASK_C | BITMASK_T,
            b'K' => BITMASK_G | BITMASK_T,
            b'V' => BITMASK_A | BITMASK_C | BITMASK_G,
            b'H' => BITMASK_A | BITMASK_C | BITMASK_T,
            b'D' => BITMASK_A | BITMASK_G | BITMASK_T,
            b'B' => BITMASK_C | BITMASK_G | BITMASK_T,
            b'N' => BITMASK_N,
            _ => return None,
        };
        Some(Self(mask))
    }

    #[inline]
    pub fn is_code_letter(letter: u8) -> bool {
        Self::from_letter(letter).is_some()
    }

    /// True if the two codes share at least one literal base
    #[inline]
    pub fn compatible(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// Check whether a string consists solely of (uppercase) ambiguity codes.
///
/// The empty string is not a code string.
pub fn is_code_string(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(AmbiguityCode::is_code_letter)
}

/// Error raised when a query string contains a non-code character
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid ambiguity code {letter:?} at offset {offset} in '{input}'")]
pub struct InvalidCodeError {
    pub input: String,
    pub offset: usize,
    pub letter: char,
}

/// A parsed query allele: an immutable sequence of ambiguity codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IupacPattern {
    text: String,
    codes: Vec<AmbiguityCode>,
}

impl IupacPattern {
    /// Parse a query string. Input is uppercased; an empty string is rejected.
    pub fn parse(input: &str) -> Result<Self, InvalidCodeError> {
        let text = input.to_ascii_uppercase();
        if text.is_empty() {
            return Err(InvalidCodeError {
                input: input.to_string(),
                offset: 0,
                letter: ' ',
            });
        }
        let codes = text
            .char_indices()
            .map(|(offset, letter)| {
                u8::try_from(letter)
                    .ok()
                    .and_then(AmbiguityCode::from_letter)
                    .ok_or_else(|| InvalidCodeError {
                        input: input.to_string(),
                        offset,
                        letter,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { text, codes })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// True for the single fully degenerate code `N`
    pub fn is_fully_degenerate(&self) -> bool {
        self.codes.len() == 1 && self.codes[0] == AmbiguityCode::N
    }

    /// Compare against a literal allele from a record
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.len() == self.codes.len()
            && self
                .codes
                .iter()
                .zip(candidate.bytes())
                .all(|(code, c)| {
                    AmbiguityCode::from_letter(c.to_ascii_uppercase())
                        .is_some_and(|c| code.compatible(c))
                })
    }
}

impl fmt::Display for IupacPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
