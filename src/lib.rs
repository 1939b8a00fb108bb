//! # beacon-query
//!
//! A library for answering genomic variant existence and frequency queries
//! over collections of VCF files.
//!
//! A dataset is a named set of per-chromosome variant files. A query names a
//! reference allele, an alternate allele or structural variant type, and a
//! genomic window. The answer says whether any call matches and, when asked,
//! how many calls, samples and distinct variants matched and at what frequency.
//!
//! ## Features
//!
//! - **IUPAC matching**: Reference and alternate bases may use ambiguity codes
//! - **Structural variants**: Symbolic alleles (`<DEL>`, `<DUP:TANDEM>`, ...) and
//!   approximate matching on variant end ranges
//! - **Sharding**: Large windows are split into work units run concurrently,
//!   in-process or on remote workers
//! - **Early exit**: Existence-only queries stop at the first hit
//! - **Caching**: Final responses are memoized per dataset and query signature
//! - **Annotations**: Per-variant fields joined from a TSV table
//!
//! ## Example
//!
//! ```rust,no_run
//! use beacon_query::{CancelToken, MatchQuery, Region, run_shard};
//! use beacon_query::source::SourceKind;
//!
//! let query = MatchQuery {
//!     region: Region::new("1", 10_000, 20_000),
//!     reference_bases: "A".to_string(),
//!     alternate_bases: Some("T".to_string()),
//!     variant_type: None,
//!     end_min: 10_000,
//!     end_max: 20_000,
//!     include_details: true,
//! };
//! let compiled = query.compile().unwrap();
//! let source = SourceKind::Vcf.open("calls.vcf.gz");
//! let result = run_shard(source.as_ref(), &compiled, &CancelToken::new()).unwrap();
//!
//! println!("exists: {}, calls: {}", result.exists, result.call_count);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: IUPAC codes, allele classification and call records
//! - [`parsing`]: VCF, bcftools query and annotation table parsers
//! - [`source`]: Record sources over plain files or bcftools
//! - [`matching`]: The per-shard matcher
//! - [`query`]: Splitting, dispatch, aggregation, annotation and pagination
//! - [`cache`]: Response memoization
//! - [`catalog`]: Dataset catalog storage
//! - [`config`]: Engine configuration
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: HTTP API for coordinators and workers

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod matching;
pub mod parsing;
pub mod query;
pub mod source;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use catalog::store::{Dataset, DatasetCatalog};
pub use config::QueryConfig;
pub use core::types::*;
pub use matching::shard::{run_shard, CancelToken, MatchQuery, ShardResult};
pub use query::{DatasetResponse, Orchestrator, QueryRequest};
