//! Parsers for the text formats variant data arrives in.
//!
//! - **VCF data lines**: `CHROM POS ID REF ALT QUAL FILTER INFO FORMAT samples...`
//! - **Query rows**: the reduced `POS REF ALT INFO GT,GT,...` layout produced
//!   by `bcftools query`
//! - **Annotation tables**: tab-delimited with a header row, keyed by the
//!   `Variant` column
//!
//! ## Extracted Fields
//!
//! | Field | Source | Required |
//! |-------|--------|----------|
//! | POS | column | Yes |
//! | REF | column | Yes |
//! | ALT | column, comma separated | Yes |
//! | AC  | INFO, per alternate | No |
//! | AN  | INFO | No |
//! | GT  | FORMAT sub-field per sample | No |

pub mod annotations;
pub mod rows;
pub mod vcf;
