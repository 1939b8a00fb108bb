//! Per-shard variant matching.
//!
//! - [`classifier`]: decides whether an allele satisfies a variant type or
//!   requested alternate bases
//! - [`shard`]: consumes one shard's record stream and accumulates counts
//!   and carrier samples
//!
//! ## Matching Algorithm
//!
//! For each record inside the shard window:
//!
//! 1. **Normalize** every `(ref, alt)` pair by trimming their shared suffix
//! 2. **Reference test**: the normalized reference is compatible with the
//!    query's reference bases, or (approximate mode) the record's end lies
//!    in `[end_min, end_max]`
//! 3. **Allele test**: the alternate matches the requested bases or type
//! 4. **Count** matched calls from `AC`/`AN` when present, otherwise by
//!    scanning every genotype
//! 5. **Attribute** samples to each matched variant when details are wanted
//!
//! Existence-only queries stop at the first matching record.
//!
//! ## Example
//!
//! ```rust,no_run
//! use beacon_query::core::types::Region;
//! use beacon_query::matching::shard::{run_shard, CancelToken, MatchQuery};
//! use beacon_query::source::VcfFileSource;
//!
//! let query = MatchQuery {
//!     region: Region::new("1", 1, 1_000_000),
//!     reference_bases: "A".to_string(),
//!     alternate_bases: Some("T".to_string()),
//!     variant_type: None,
//!     end_min: 1,
//!     end_max: 1_000_000,
//!     include_details: true,
//! }
//! .compile()
//! .unwrap();
//!
//! let source = VcfFileSource::new("calls.vcf.gz");
//! let result = run_shard(&source, &query, &CancelToken::new()).unwrap();
//! println!("exists={} calls={}", result.exists, result.call_count);
//! ```

pub mod classifier;
pub mod shard;

pub use shard::{run_shard, CancelToken, MatchQuery, ShardResult};
