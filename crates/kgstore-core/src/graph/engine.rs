//! Adjacency consistency engine.
//!
//! [`KnowledgeGraph`] is the only writer of the `edges_to` / `edges_from`
//! fields and of the edge collection. Each mutation runs in three phases:
//!
//! 1. read the endpoint nodes into an [`AdjacencyWorkset`],
//! 2. apply the edge's adjacency deltas in memory,
//! 3. write the changed adjacency fields and edge records as one
//!    [`WriteBatch`].
//!
//! With a store that commits batches atomically, phase 3 is all-or-nothing.
//! Otherwise the writes go out one by one and a failure part way leaves the
//! earlier ones in place; every adjacency insertion is a set union, so
//! re-running `add_edge` repairs it. Phase 1 and phase 3 are never atomic
//! with each other: two concurrent mutations of the same node can lose one
//! of the updates.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::KgConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::metrics::GraphMetrics;
use crate::store::{DocumentStore, WriteBatch};

use super::adjacency::{AdjacencyWorkset, DeltaOp, DeltaOutcome, EdgeShape, NodeAdjacency};
use super::backend::GraphBackend;
use super::communities::CommunityRepository;
use super::edge_id::edge_uid;
use super::materialize::MaterializedGraph;
use super::neighbors::VectorNeighbors;
use super::nodes::NodeRepository;
use super::types::{decode, encode, CommunityRecord, EdgeRecord, NodePatch, NodeRecord};

/// Per-collection deletion counts returned by [`KnowledgeGraph::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Node documents deleted.
    pub nodes: usize,
    /// Edge documents deleted.
    pub edges: usize,
    /// Community documents deleted.
    pub communities: usize,
}

/// A knowledge graph stored in a schemaless document store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kgstore_core::graph::{EdgeRecord, KnowledgeGraph, NodeRecord};
/// use kgstore_core::store::InMemoryDocumentStore;
///
/// let graph = KnowledgeGraph::new(Arc::new(InMemoryDocumentStore::new())).unwrap();
/// graph.add_node("A", &NodeRecord::new("A", "first")).unwrap();
/// graph.add_node("B", &NodeRecord::new("B", "second")).unwrap();
/// graph.add_edge(&EdgeRecord::undirected("A", "B", "knows").unwrap()).unwrap();
///
/// assert!(graph.get_node("A").unwrap().edges_to().contains("B"));
/// assert!(graph.edge_exists("B", "A").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    backend: GraphBackend,
    nodes: NodeRepository,
    communities: CommunityRepository,
    neighbors: VectorNeighbors,
}

impl KnowledgeGraph {
    /// Opens a graph over `store` with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::with_config`].
    pub fn new(store: Arc<dyn DocumentStore>) -> Result<Self> {
        Self::with_config(store, KgConfig::default())
    }

    /// Opens a graph over `store` with its own metrics.
    ///
    /// # Errors
    ///
    /// `Error::Config` if the configuration is invalid;
    /// `Error::InvalidArgument` if `write_mode = "atomic"` and the store has
    /// no atomic batches.
    pub fn with_config(store: Arc<dyn DocumentStore>, config: KgConfig) -> Result<Self> {
        Self::with_metrics(store, config, GraphMetrics::shared())
    }

    /// Opens a graph that reports into shared metrics.
    ///
    /// # Errors
    ///
    /// See [`Self::with_config`].
    pub fn with_metrics(
        store: Arc<dyn DocumentStore>,
        config: KgConfig,
        metrics: Arc<GraphMetrics>,
    ) -> Result<Self> {
        let backend = GraphBackend::new(store, config, metrics)?;
        debug!(atomic = backend.is_atomic(), "knowledge graph opened");
        Ok(Self {
            nodes: NodeRepository::new(backend.clone()),
            communities: CommunityRepository::new(backend.clone()),
            neighbors: VectorNeighbors::new(backend.clone()),
            backend,
        })
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &KgConfig {
        self.backend.config()
    }

    /// Returns the operation counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<GraphMetrics> {
        self.backend.metrics()
    }

    /// Returns true if mutations are committed as atomic batches.
    #[must_use]
    pub fn uses_atomic_batches(&self) -> bool {
        self.backend.is_atomic()
    }

    /// Node repository.
    #[must_use]
    pub fn nodes(&self) -> &NodeRepository {
        &self.nodes
    }

    /// Community repository.
    #[must_use]
    pub fn communities(&self) -> &CommunityRepository {
        &self.communities
    }

    /// Vector neighbor lookup.
    #[must_use]
    pub fn vector_neighbors(&self) -> &VectorNeighbors {
        &self.neighbors
    }

    // ── Nodes ──────────────────────────────────────────────────────────

    /// See [`NodeRepository::add_node`].
    pub fn add_node(&self, uid: &str, node: &NodeRecord) -> Result<()> {
        self.nodes.add_node(uid, node)
    }

    /// See [`NodeRepository::get_node`].
    pub fn get_node(&self, uid: &str) -> Result<NodeRecord> {
        self.nodes.get_node(uid)
    }

    /// See [`NodeRepository::update_node`].
    pub fn update_node(&self, uid: &str, patch: &NodePatch) -> Result<()> {
        self.nodes.update_node(uid, patch)
    }

    /// See [`NodeRepository::remove_node`].
    pub fn remove_node(&self, uid: &str) -> Result<()> {
        self.nodes.remove_node(uid)
    }

    /// See [`NodeRepository::node_exists`].
    pub fn node_exists(&self, uid: &str) -> Result<bool> {
        self.nodes.node_exists(uid)
    }

    // ── Edges ──────────────────────────────────────────────────────────

    /// Adds an edge and records it in both endpoints' adjacency.
    ///
    /// A directed edge writes one edge record; an undirected edge writes the
    /// record and its reverse and links the endpoints both ways. Adding an
    /// existing edge again rewrites its records and leaves adjacency as is.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` if the record's `edge_uid` does not match
    ///   its endpoints.
    /// - `Error::NotFound` if either endpoint node is missing.
    /// - `Error::Store` if a write fails.
    pub fn add_edge(&self, edge: &EdgeRecord) -> Result<()> {
        edge.validate()?;
        let shape = EdgeShape::of(edge.clone());

        let mut workset = AdjacencyWorkset::new();
        self.backend.load_required(&mut workset, edge.source_uid())?;
        self.backend.load_required(&mut workset, edge.target_uid())?;
        for delta in shape.deltas(DeltaOp::Insert) {
            workset.apply(&delta);
        }

        let mut batch = WriteBatch::new();
        self.backend.queue_patches(&mut batch, &workset);
        let records = self.queue_records(&mut batch, &shape)?;
        self.backend
            .commit(batch, &format!("adding edge '{}'", edge.edge_uid()))?;

        GraphMetrics::add(&self.backend.metrics().edges_added, records);
        debug!(
            edge_uid = edge.edge_uid(),
            directed = edge.is_directed(),
            records,
            "edge added"
        );
        Ok(())
    }

    /// Reads the edge record keyed by `(source, target)`.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if absent; `Error::Corrupt` if the stored document
    /// is not an edge or its key does not match its endpoints.
    pub fn get_edge(&self, source_uid: &str, target_uid: &str) -> Result<EdgeRecord> {
        let key = edge_uid(source_uid, target_uid)?;
        let doc = self
            .backend
            .fetch(self.backend.edges(), &key)?
            .ok_or_else(|| Error::NotFound(format!("edge '{key}'")))?;
        let edge: EdgeRecord = decode(doc, &format!("edge '{key}'"))?;
        if edge.edge_uid() != key {
            return Err(Error::Corrupt(format!(
                "edge stored under '{key}' has edge_uid '{}'",
                edge.edge_uid()
            )));
        }
        edge.validate().map_err(|e| Error::Corrupt(format!("edge '{key}': {e}")))?;
        Ok(edge)
    }

    /// Rewrites an existing edge and adds any adjacency entry it is missing.
    ///
    /// Additive only: no adjacency entry is ever removed. For an undirected
    /// edge the reverse record is rewritten too. A missing endpoint follows
    /// the configured cascade policy.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if no record exists under the edge's key (or, in
    /// strict mode, an endpoint is missing).
    pub fn update_edge(&self, edge: &EdgeRecord) -> Result<()> {
        edge.validate()?;
        let key = edge.edge_uid();
        if !self.backend.exists(self.backend.edges(), key)? {
            return Err(Error::NotFound(format!("edge '{key}'")));
        }
        let shape = EdgeShape::of(edge.clone());
        let policy = self.backend.config().consistency.cascade;

        let mut workset = AdjacencyWorkset::new();
        for uid in [edge.source_uid(), edge.target_uid()] {
            self.backend.load_neighbor(&mut workset, uid, key, policy)?;
        }
        for delta in shape.deltas(DeltaOp::Insert) {
            if workset.apply(&delta) == Some(DeltaOutcome::Applied) {
                debug!(
                    edge_uid = key,
                    node = %delta.node,
                    field = delta.direction.field(),
                    "restored missing adjacency entry"
                );
            }
        }

        let mut batch = WriteBatch::new();
        let records = self.queue_records(&mut batch, &shape)?;
        self.backend.queue_patches(&mut batch, &workset);
        self.backend
            .commit(batch, &format!("updating edge '{key}'"))?;

        GraphMetrics::add(&self.backend.metrics().edges_updated, records);
        debug!(edge_uid = key, records, "edge updated");
        Ok(())
    }

    /// Removes an edge and its adjacency entries.
    ///
    /// The stored record decides whether the reverse record and reverse
    /// entries go too. Every adjacency entry is checked before anything is
    /// written.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the edge or one of its endpoint nodes is missing.
    /// - `Error::InvalidState` if an adjacency entry the edge implies is absent.
    pub fn remove_edge(&self, source_uid: &str, target_uid: &str) -> Result<()> {
        let edge = self.get_edge(source_uid, target_uid)?;
        let shape = EdgeShape::of(edge);

        let mut workset = AdjacencyWorkset::new();
        self.backend.load_required(&mut workset, source_uid)?;
        self.backend.load_required(&mut workset, target_uid)?;
        for delta in shape.deltas(DeltaOp::Remove) {
            if workset.apply(&delta) != Some(DeltaOutcome::Applied) {
                return Err(Error::InvalidState(format!(
                    "'{}' is missing from {}.{} while removing edge '{}'",
                    delta.neighbor,
                    delta.node,
                    delta.direction.field(),
                    shape.forward().edge_uid()
                )));
            }
        }

        let edges = self.backend.edges();
        let mut batch = WriteBatch::new();
        self.backend.queue_patches(&mut batch, &workset);
        let records = shape.records();
        for record in &records {
            if record.edge_uid() != shape.forward().edge_uid()
                && !self.backend.exists(edges, record.edge_uid())?
            {
                warn!(edge_uid = record.edge_uid(), "reverse edge record already absent");
            }
            batch.delete(edges, record.edge_uid());
        }
        self.backend.commit(
            batch,
            &format!("removing edge '{}'", shape.forward().edge_uid()),
        )?;

        GraphMetrics::add(&self.backend.metrics().edges_removed, records.len() as u64);
        debug!(
            edge_uid = shape.forward().edge_uid(),
            records = records.len(),
            "edge removed"
        );
        Ok(())
    }

    /// Returns true if a record exists under `edge_uid(source, target)`.
    /// Invalid uids never have an edge. Store failures are returned, not
    /// read as "absent".
    ///
    /// # Errors
    ///
    /// `Error::Store` if the probe fails.
    pub fn edge_exists(&self, source_uid: &str, target_uid: &str) -> Result<bool> {
        match edge_uid(source_uid, target_uid) {
            Ok(key) => self.backend.exists(self.backend.edges(), &key),
            Err(_) => Ok(false),
        }
    }

    fn queue_records(&self, batch: &mut WriteBatch, shape: &EdgeShape) -> Result<u64> {
        let mut written = 0;
        for record in shape.records() {
            batch.set(self.backend.edges(), record.edge_uid(), encode(record, "edge")?);
            written += 1;
        }
        Ok(written)
    }

    // ── Maintenance ────────────────────────────────────────────────────

    /// Removes every node whose `edges_to` and `edges_from` are both empty at
    /// scan time, returning their uids in sorted order.
    ///
    /// Each candidate's adjacency is re-read right before its removal; a node
    /// that gained a reference since the scan, or vanished, is skipped. The
    /// re-read and the delete are still separate calls, so an edge added in
    /// between can be lost.
    ///
    /// # Errors
    ///
    /// `Error::Store` if the scan or a removal fails.
    pub fn clean_zero_degree_nodes(&self) -> Result<Vec<String>> {
        let mut candidates: Vec<String> = self
            .backend
            .scan(self.backend.nodes())?
            .into_iter()
            .filter_map(|(uid, doc)| {
                match decode::<NodeAdjacency>(doc, &format!("adjacency of node '{uid}'")) {
                    Ok(adjacency) => adjacency.is_isolated().then_some(uid),
                    Err(e) => {
                        warn!(uid = %uid, error = %e, "skipping node with unreadable adjacency");
                        None
                    }
                }
            })
            .collect();
        candidates.sort_unstable();

        let mut removed = Vec::with_capacity(candidates.len());
        for uid in candidates {
            match self.nodes.remove_if_isolated(&uid) {
                Ok(true) => removed.push(uid),
                Ok(false) => {}
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidArgument) => {
                    warn!(uid = %uid, error = %e, "skipping zero-degree node");
                }
                Err(e) => return Err(e),
            }
        }
        info!(removed = removed.len(), "zero-degree nodes removed");
        Ok(removed)
    }

    /// Deletes edge records whose source or target node no longer exists,
    /// returning their keys in sorted order.
    ///
    /// Node removal leaves such records behind; this is the explicit cleanup.
    ///
    /// # Errors
    ///
    /// `Error::Store` if a scan or the deletes fail.
    pub fn purge_stale_edges(&self) -> Result<Vec<String>> {
        let node_uids: HashSet<String> = self
            .backend
            .scan(self.backend.nodes())?
            .into_iter()
            .map(|(uid, _)| uid)
            .collect();

        let mut stale = Vec::new();
        for (key, doc) in self.backend.scan(self.backend.edges())? {
            match decode::<EdgeRecord>(doc, &format!("edge '{key}'")) {
                Ok(edge) => {
                    if !node_uids.contains(edge.source_uid())
                        || !node_uids.contains(edge.target_uid())
                    {
                        stale.push(key);
                    }
                }
                Err(e) => warn!(edge_uid = %key, error = %e, "skipping unreadable edge record"),
            }
        }
        stale.sort_unstable();

        let edges = self.backend.edges();
        let mut batch = WriteBatch::new();
        for key in &stale {
            batch.delete(edges, key);
        }
        self.backend.commit(batch, "purging stale edges")?;

        GraphMetrics::add(&self.backend.metrics().stale_edges, stale.len() as u64);
        info!(purged = stale.len(), "stale edge records purged");
        Ok(stale)
    }

    /// Deletes every node, edge and community document.
    ///
    /// # Errors
    ///
    /// `Error::Store` if a scan or delete fails; collections flushed before
    /// the failure stay empty.
    pub fn flush(&self) -> Result<FlushReport> {
        let report = FlushReport {
            nodes: self.flush_collection(self.backend.nodes())?,
            edges: self.flush_collection(self.backend.edges())?,
            communities: self.flush_collection(self.backend.communities())?,
        };
        info!(
            nodes = report.nodes,
            edges = report.edges,
            communities = report.communities,
            "graph flushed"
        );
        Ok(report)
    }

    fn flush_collection(&self, collection: &str) -> Result<usize> {
        let keys: Vec<String> = self
            .backend
            .scan(collection)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        let mut batch = WriteBatch::new();
        for key in &keys {
            batch.delete(collection, key);
        }
        self.backend
            .commit(batch, &format!("flushing {collection}"))?;
        Ok(keys.len())
    }

    // ── Read-side views ────────────────────────────────────────────────

    /// See [`CommunityRepository::get_community`].
    pub fn get_community(&self, title: &str) -> Result<CommunityRecord> {
        self.communities.get_community(title)
    }

    /// See [`CommunityRepository::list_communities`].
    pub fn list_communities(&self) -> Result<Vec<CommunityRecord>> {
        self.communities.list_communities()
    }

    /// See [`CommunityRepository::store_community`].
    pub fn store_community(&self, community: &CommunityRecord) -> Result<()> {
        self.communities.store_community(community)
    }

    /// See [`VectorNeighbors::nearest_neighbors`].
    pub fn nearest_neighbors(&self, query: &[f32]) -> Result<Vec<NodeRecord>> {
        self.neighbors.nearest_neighbors(query)
    }

    /// Loads every node and edge record into a [`MaterializedGraph`].
    ///
    /// # Errors
    ///
    /// `Error::Corrupt` if a stored node or edge does not parse.
    pub fn materialize(&self) -> Result<MaterializedGraph> {
        MaterializedGraph::load(&self.backend)
    }
}
