//! Dataset catalog.
//!
//! A dataset is a named collection of variant files plus the metadata the
//! response needs: its sample count (the frequency denominator), a
//! description, and an optional annotation table. Catalogs are JSON files:
//!
//! ```json
//! {
//!   "datasets": [
//!     {
//!       "dataset_id": "1000g",
//!       "name": "1000 Genomes",
//!       "description": "Phase 3 release",
//!       "sample_count": 2504,
//!       "vcf_locations": { "/data/1000g.chr1.vcf.gz": "1" },
//!       "annotation_location": "/data/1000g.annotations.tsv.gz"
//!     }
//!   ]
//! }
//! ```
//!
//! `vcf_locations` maps each variant file to the chromosome name it uses, so
//! files that name the same contig differently (`1` vs `chr1`) can share a
//! dataset.

pub mod store;
