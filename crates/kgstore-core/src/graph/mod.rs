//! Knowledge graph over a document store.
//!
//! Nodes carry their own adjacency (`edges_to` / `edges_from`); edges are
//! also stored as records in a separate collection keyed by
//! [`edge_uid`]. [`KnowledgeGraph`] keeps the two representations in step.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kgstore_core::graph::{EdgeRecord, KnowledgeGraph, NodeRecord};
//! use kgstore_core::store::InMemoryDocumentStore;
//!
//! let graph = KnowledgeGraph::new(Arc::new(InMemoryDocumentStore::new())).unwrap();
//! graph.add_node("A", &NodeRecord::new("A", "first")).unwrap();
//! graph.add_node("B", &NodeRecord::new("B", "second")).unwrap();
//! graph.add_edge(&EdgeRecord::directed("A", "B", "cites").unwrap()).unwrap();
//!
//! graph.remove_edge("A", "B").unwrap();
//! assert!(graph.get_node("B").unwrap().edges_from().is_empty());
//! ```

pub mod adjacency;
mod backend;
mod communities;
mod edge_id;
mod engine;
mod materialize;
mod neighbors;
mod nodes;
mod types;


pub use adjacency::{AdjacencyDelta, DeltaOp, DeltaOutcome, Direction, EdgeShape};
pub use communities::CommunityRepository;
pub use edge_id::{edge_uid, validate_uid, EDGE_UID_DELIMITER};
pub use engine::{FlushReport, KnowledgeGraph};
pub use materialize::MaterializedGraph;
pub use neighbors::VectorNeighbors;
pub use nodes::NodeRepository;
pub use types::{CommunityRecord, EdgeRecord, NodePatch, NodeRecord, RESERVED_NODE_FIELDS};
