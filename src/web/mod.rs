//! HTTP service for shard workers and orchestrated queries.
//!
//! ## Starting the Server
//!
//! ```text
//! # Coordinator answering queries over a dataset catalog
//! beacon-query serve --catalog datasets.json --cache-dir /var/cache/beacon
//!
//! # Worker that only runs shards
//! beacon-query serve --address 0.0.0.0 --port 9000
//!
//! # Coordinator fanning shards out to workers
//! beacon-query serve --catalog datasets.json --worker http://w1:9000,http://w2:9000
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `POST /api/shard` - Run one work unit and return its shard result
//! - `POST /api/query` - Run an orchestrated query against catalog datasets
//! - `GET /api/datasets` - List the datasets in the catalog

pub mod server;
