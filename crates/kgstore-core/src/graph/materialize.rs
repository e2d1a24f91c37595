//! In-memory snapshot of the whole graph for offline analysis.
//!
//! Built from a full scan of the node and edge collections. Edges are kept
//! exactly as stored: an undirected edge contributes both of its records, so
//! neighbor lists and degrees count it twice.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::Result;
use crate::metrics::GraphMetrics;

use super::backend::GraphBackend;
use super::types::{decode, EdgeRecord, NodeRecord};

/// Undirected multigraph view over the stored nodes and edge records.
#[derive(Debug, Default, Clone)]
pub struct MaterializedGraph {
    /// Nodes indexed by uid.
    nodes: HashMap<String, NodeRecord>,
    /// Edge records in load order.
    edges: Vec<EdgeRecord>,
    /// uid -> indexes into `edges`, once per incident endpoint.
    incidence: HashMap<String, Vec<usize>>,
    /// Edge records skipped because an endpoint node is missing.
    stale_edges: usize,
}

impl MaterializedGraph {
    pub(crate) fn load(backend: &GraphBackend) -> Result<Self> {
        let mut graph = Self::default();

        for (uid, doc) in backend.scan(backend.nodes())? {
            let node: NodeRecord = decode(doc, &format!("node '{uid}'"))?;
            graph.nodes.insert(uid, node);
        }

        let mut stale = 0u64;
        for (key, doc) in backend.scan(backend.edges())? {
            let edge: EdgeRecord = decode(doc, &format!("edge '{key}'"))?;
            if !graph.add_edge(edge) {
                warn!(edge_uid = %key, "skipping stale edge with a missing endpoint");
                stale += 1;
            }
        }
        GraphMetrics::add(&backend.metrics().stale_edges, stale);

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            stale_edges = graph.stale_edges,
            "graph materialized"
        );
        Ok(graph)
    }

    /// Adds an edge if both endpoints are known; returns false otherwise.
    fn add_edge(&mut self, edge: EdgeRecord) -> bool {
        if !self.nodes.contains_key(edge.source_uid()) || !self.nodes.contains_key(edge.target_uid())
        {
            self.stale_edges += 1;
            return false;
        }
        let id = self.edges.len();
        self.incidence
            .entry(edge.source_uid().to_string())
            .or_default()
            .push(id);
        self.incidence
            .entry(edge.target_uid().to_string())
            .or_default()
            .push(id);
        self.edges.push(edge);
        true
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edge records, counting both records of an
    /// undirected edge.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the node is part of the snapshot.
    #[must_use]
    pub fn has_node(&self, uid: &str) -> bool {
        self.nodes.contains_key(uid)
    }

    /// Gets a node by uid.
    #[must_use]
    pub fn node(&self, uid: &str) -> Option<&NodeRecord> {
        self.nodes.get(uid)
    }

    /// Returns all node uids, sorted.
    #[must_use]
    pub fn node_uids(&self) -> Vec<&str> {
        let mut uids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        uids.sort_unstable();
        uids
    }

    /// Returns all edge records.
    #[must_use]
    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    /// Returns the edge records incident to a node.
    #[must_use]
    pub fn incident_edges(&self, uid: &str) -> Vec<&EdgeRecord> {
        self.incidence
            .get(uid)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Returns the neighbor uids of a node, one entry per incident edge
    /// record (duplicates included).
    #[must_use]
    pub fn neighbors(&self, uid: &str) -> Vec<&str> {
        self.incident_edges(uid)
            .into_iter()
            .map(|edge| {
                if edge.source_uid() == uid {
                    edge.target_uid()
                } else {
                    edge.source_uid()
                }
            })
            .collect()
    }

    /// Returns the number of incident edge ends; a self-loop counts twice.
    #[must_use]
    pub fn degree(&self, uid: &str) -> usize {
        self.incidence.get(uid).map_or(0, Vec::len)
    }

    /// Returns the number of edge records skipped for a missing endpoint.
    #[must_use]
    pub fn stale_edge_count(&self) -> usize {
        self.stale_edges
    }
}
