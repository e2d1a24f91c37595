//! # kgstore core
//!
//! A knowledge graph (entities, relationships and communities) kept on top of
//! a schemaless document store that only offers per-document CRUD and
//! collection scans.
//!
//! Each node document embeds its adjacency (`edges_to` / `edges_from`), and
//! every edge is also stored as its own record keyed by
//! `source + "_to_" + target`. The [`KnowledgeGraph`] engine keeps both in
//! step across multi-document writes:
//!
//! - **Directed and undirected edges**: an undirected edge is two directed
//!   records plus four adjacency entries.
//! - **Write batches**: atomic when the store supports it, best-effort
//!   sequential otherwise.
//! - **Cascade policy**: missing neighbors are skipped (tolerant) or fail
//!   the call (strict).
//! - **Maintenance**: zero-degree pruning, stale edge purge, full flush.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use kgstore_core::{EdgeRecord, InMemoryDocumentStore, KnowledgeGraph, NodeRecord};
//!
//! fn main() -> kgstore_core::Result<()> {
//!     let graph = KnowledgeGraph::new(Arc::new(InMemoryDocumentStore::new()))?;
//!
//!     graph.add_node("ALICE", &NodeRecord::new("ALICE", "A person"))?;
//!     graph.add_node("ACME", &NodeRecord::new("ACME", "A company"))?;
//!     graph.add_edge(&EdgeRecord::undirected("ALICE", "ACME", "works at")?)?;
//!
//!     assert!(graph.get_node("ACME")?.edges_to().contains("ALICE"));
//!     assert!(graph.get_edge("ACME", "ALICE")?.description() == "works at");
//!
//!     graph.remove_edge("ALICE", "ACME")?;
//!     assert_eq!(graph.clean_zero_degree_nodes()?, vec!["ACME", "ALICE"]);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
// Clippy lints configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(
    test,
    allow(
        clippy::doc_markdown,
        clippy::uninlined_format_args,
        clippy::single_match_else,
        clippy::float_cmp
    )
)]

pub mod config;
pub mod distance;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod store;

pub use config::{CascadePolicy, KgConfig, WriteMode};
pub use distance::DistanceMetric;
pub use error::{Error, ErrorKind, Result};
pub use graph::{
    CommunityRecord, EdgeRecord, EdgeShape, FlushReport, KnowledgeGraph, MaterializedGraph,
    NodePatch, NodeRecord,
};
pub use metrics::{GraphMetrics, MetricsSnapshot};
pub use store::{DocumentStore, InMemoryDocumentStore, StoreError, WriteBatch};
