//! Orchestrated dataset queries.
//!
//! A query over a large interval is split into fixed-width windows, one work
//! unit per window and variant file. Units run concurrently through a
//! [`dispatcher::Dispatcher`], and their results are merged into one
//! dataset-level answer:
//!
//! - [`splitter`]: windows and work units
//! - [`dispatcher`]: local and remote shard execution
//! - [`aggregate`]: order-independent merging of shard results
//! - [`frequency`]: sample frequency with cohort-scaled precision
//! - [`annotate`]: joining external annotation rows by variant name
//! - [`paginate`]: position-sorted page windows
//! - [`orchestrator`]: the end-to-end flow, including the response cache

pub mod aggregate;
pub mod annotate;
pub mod dispatcher;
pub mod frequency;
pub mod orchestrator;
pub mod paginate;
pub mod splitter;

pub use orchestrator::{DatasetResponse, Orchestrator, QueryRequest};
