//! Adjacency set algebra.
//!
//! Every graph mutation is first computed here, purely in memory, as a list
//! of [`AdjacencyDelta`]s applied to an [`AdjacencyWorkset`] of the nodes it
//! touches. Only the resulting patches are handed to the store, so the set
//! logic is testable without any backend.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::store::Document;

use super::types::EdgeRecord;

/// Which adjacency set of a node a delta targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `edges_to`: neighbors this node points at.
    Outbound,
    /// `edges_from`: neighbors pointing at this node.
    Inbound,
}

impl Direction {
    /// Name of the persisted field.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::Outbound => "edges_to",
            Self::Inbound => "edges_from",
        }
    }
}

/// Set operation carried by a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOp {
    /// Set union with one element.
    Insert,
    /// Set difference with one element.
    Remove,
}

/// Result of applying a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// The set changed.
    Applied,
    /// Insert of a present element, or remove of an absent one.
    Unchanged,
}

/// One adjacency change: `op` `neighbor` in `node`'s `direction` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyDelta {
    /// Node whose adjacency changes.
    pub node: String,
    /// Set being changed.
    pub direction: Direction,
    /// Element inserted or removed.
    pub neighbor: String,
    /// Operation.
    pub op: DeltaOp,
}

impl AdjacencyDelta {
    /// Creates a delta.
    #[must_use]
    pub fn new(node: &str, direction: Direction, neighbor: &str, op: DeltaOp) -> Self {
        Self {
            node: node.to_string(),
            direction,
            neighbor: neighbor.to_string(),
            op,
        }
    }
}

/// Applies one set operation.
pub fn apply_delta(set: &mut BTreeSet<String>, op: DeltaOp, neighbor: &str) -> DeltaOutcome {
    let changed = match op {
        DeltaOp::Insert => set.insert(neighbor.to_string()),
        DeltaOp::Remove => set.remove(neighbor),
    };
    if changed {
        DeltaOutcome::Applied
    } else {
        DeltaOutcome::Unchanged
    }
}

/// The adjacency fields of a stored node; other fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeAdjacency {
    /// Outbound neighbors.
    #[serde(default)]
    pub edges_to: BTreeSet<String>,
    /// Inbound neighbors.
    #[serde(default)]
    pub edges_from: BTreeSet<String>,
}

impl NodeAdjacency {
    /// Returns the set for a direction.
    #[must_use]
    pub fn set(&self, direction: Direction) -> &BTreeSet<String> {
        match direction {
            Direction::Outbound => &self.edges_to,
            Direction::Inbound => &self.edges_from,
        }
    }

    fn set_mut(&mut self, direction: Direction) -> &mut BTreeSet<String> {
        match direction {
            Direction::Outbound => &mut self.edges_to,
            Direction::Inbound => &mut self.edges_from,
        }
    }

    /// Returns true if both sets are empty.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.edges_to.is_empty() && self.edges_from.is_empty()
    }
}

/// How an edge occupies the edge collection.
///
/// An undirected edge is stored as two directed records; both write and
/// delete paths iterate [`EdgeShape::records`] instead of special-casing the
/// reverse direction. A self-loop is always a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeShape {
    /// One record, `source -> target`.
    Directed(EdgeRecord),
    /// `source -> target` plus its mirror `target -> source`.
    UndirectedPair {
        /// Record keyed by `edge_uid(source, target)`.
        forward: EdgeRecord,
        /// Record keyed by `edge_uid(target, source)`.
        reverse: EdgeRecord,
    },
}

impl EdgeShape {
    /// Classifies an edge by its `directed` flag.
    #[must_use]
    pub fn of(edge: EdgeRecord) -> Self {
        if edge.is_directed() || edge.is_self_loop() {
            Self::Directed(edge)
        } else {
            let reverse = edge.reversed();
            Self::UndirectedPair {
                forward: edge,
                reverse,
            }
        }
    }

    /// The record keyed by the caller's `(source, target)`.
    #[must_use]
    pub fn forward(&self) -> &EdgeRecord {
        match self {
            Self::Directed(edge) => edge,
            Self::UndirectedPair { forward, .. } => forward,
        }
    }

    /// Every record this edge occupies, forward first.
    #[must_use]
    pub fn records(&self) -> Vec<&EdgeRecord> {
        match self {
            Self::Directed(edge) => vec![edge],
            Self::UndirectedPair { forward, reverse } => vec![forward, reverse],
        }
    }

    /// Adjacency changes that add (or remove) this edge, in write order.
    #[must_use]
    pub fn deltas(&self, op: DeltaOp) -> Vec<AdjacencyDelta> {
        self.records()
            .into_iter()
            .flat_map(|edge| {
                [
                    AdjacencyDelta::new(
                        edge.source_uid(),
                        Direction::Outbound,
                        edge.target_uid(),
                        op,
                    ),
                    AdjacencyDelta::new(
                        edge.target_uid(),
                        Direction::Inbound,
                        edge.source_uid(),
                        op,
                    ),
                ]
            })
            .collect()
    }
}

#[derive(Debug)]
struct WorksetEntry {
    adjacency: NodeAdjacency,
    dirty_to: bool,
    dirty_from: bool,
}

/// Adjacency of the nodes touched by one mutation, in load order.
#[derive(Debug, Default)]
pub struct AdjacencyWorkset {
    nodes: IndexMap<String, WorksetEntry>,
}

impl AdjacencyWorkset {
    /// Creates an empty workset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node's stored adjacency. A node already present is kept as is.
    pub fn load(&mut self, uid: &str, adjacency: NodeAdjacency) {
        self.nodes
            .entry(uid.to_string())
            .or_insert_with(|| WorksetEntry {
                adjacency,
                dirty_to: false,
                dirty_from: false,
            });
    }

    /// Number of loaded nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node has been loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns true if the node has been loaded.
    #[must_use]
    pub fn contains(&self, uid: &str) -> bool {
        self.nodes.contains_key(uid)
    }

    /// Returns the current adjacency of a loaded node.
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&NodeAdjacency> {
        self.nodes.get(uid).map(|entry| &entry.adjacency)
    }

    /// Applies a delta; `None` if its node was never loaded.
    pub fn apply(&mut self, delta: &AdjacencyDelta) -> Option<DeltaOutcome> {
        let entry = self.nodes.get_mut(&delta.node)?;
        let outcome = apply_delta(
            entry.adjacency.set_mut(delta.direction),
            delta.op,
            &delta.neighbor,
        );
        if outcome == DeltaOutcome::Applied {
            match delta.direction {
                Direction::Outbound => entry.dirty_to = true,
                Direction::Inbound => entry.dirty_from = true,
            }
        }
        Some(outcome)
    }

    /// Partial documents for every changed node, containing only the
    /// changed adjacency fields, in load order.
    #[must_use]
    pub fn patches(&self) -> Vec<(String, Document)> {
        self.nodes
            .iter()
            .filter(|(_, entry)| entry.dirty_to || entry.dirty_from)
            .map(|(uid, entry)| {
                let mut patch = Document::new();
                if entry.dirty_to {
                    patch.insert(
                        Direction::Outbound.field().to_string(),
                        uid_array(&entry.adjacency.edges_to),
                    );
                }
                if entry.dirty_from {
                    patch.insert(
                        Direction::Inbound.field().to_string(),
                        uid_array(&entry.adjacency.edges_from),
                    );
                }
                (uid.clone(), patch)
            })
            .collect()
    }
}

fn uid_array(set: &BTreeSet<String>) -> Value {
    Value::Array(set.iter().cloned().map(Value::String).collect())
}
