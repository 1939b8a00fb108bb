//! Core data types for variant matching.
//!
//! - [`iupac`]: the 16 nucleotide ambiguity codes and sequence compatibility
//! - [`allele`]: allele normalization and variant names
//! - [`types`]: regions, variant types, and dataset inclusion modes
//! - [`record`]: variant records as streamed from a source
//!
//! ## Ambiguity Codes
//!
//! | Code | Bases | Code | Bases |
//! |------|-------|------|-------|
//! | A | A | K | G, T |
//! | C | C | M | A, C |
//! | G | G | B | C, G, T |
//! | T, U | T | D | A, G, T |
//! | R | A, G | H | A, C, T |
//! | Y | C, T | V | A, C, G |
//! | S | C, G | N | A, C, G, T |
//! | W | A, T | | |
//!
//! Two codes are compatible when their base sets intersect, so `N` is
//! compatible with everything and `R` is compatible with `A` but not `C`.

pub mod allele;
pub mod iupac;
pub mod record;
pub mod types;
