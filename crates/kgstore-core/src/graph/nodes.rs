//! Node repository: CRUD over the node collection.
//!
//! Adjacency fields are never written here from caller input. Node removal is
//! the one exception: it strips the removed uid from every neighbor before
//! deleting the node, but leaves the edge collection untouched (see
//! [`crate::graph::KnowledgeGraph::purge_stale_edges`]).

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::CascadePolicy;
use crate::error::{Error, Result};
use crate::metrics::GraphMetrics;
use crate::store::{StoreError, WriteBatch};

use super::adjacency::{AdjacencyDelta, AdjacencyWorkset, DeltaOp, DeltaOutcome, Direction};
use super::backend::GraphBackend;
use super::edge_id::validate_uid;
use super::types::{decode, encode, NodePatch, NodeRecord};

/// CRUD over node records.
#[derive(Debug, Clone)]
pub struct NodeRepository {
    backend: GraphBackend,
}

impl NodeRepository {
    pub(crate) fn new(backend: GraphBackend) -> Self {
        Self { backend }
    }

    /// Creates a node.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` if the uid is invalid, does not match the
    ///   record, the record carries adjacency, or an attribute uses a
    ///   reserved field name.
    /// - `Error::AlreadyExists` if a node with this uid exists.
    pub fn add_node(&self, uid: &str, node: &NodeRecord) -> Result<()> {
        node.validate_new(uid)?;
        let collection = self.backend.nodes();
        if self.backend.exists(collection, uid)? {
            return Err(Error::AlreadyExists(format!("node '{uid}'")));
        }
        let doc = encode(node, "node")?;
        self.backend
            .store()
            .set(collection, uid, doc)
            .map_err(|e| Error::store(format!("writing {collection}/{uid}"), e))?;
        GraphMetrics::add(&self.backend.metrics().nodes_added, 1);
        debug!(uid, "node added");
        Ok(())
    }

    /// Reads a node.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if absent, `Error::Corrupt` if the stored document
    /// is not a node.
    pub fn get_node(&self, uid: &str) -> Result<NodeRecord> {
        validate_uid(uid)?;
        let doc = self
            .backend
            .fetch(self.backend.nodes(), uid)?
            .ok_or_else(|| Error::NotFound(format!("node '{uid}'")))?;
        decode(doc, &format!("node '{uid}'"))
    }

    /// Overwrites the fields named by `patch`; other fields are kept.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the node does not exist, `Error::InvalidArgument`
    /// if the patch names a reserved field.
    pub fn update_node(&self, uid: &str, patch: &NodePatch) -> Result<()> {
        validate_uid(uid)?;
        let partial = patch.to_document()?;
        let collection = self.backend.nodes();
        if partial.is_empty() {
            return if self.backend.exists(collection, uid)? {
                Ok(())
            } else {
                Err(Error::NotFound(format!("node '{uid}'")))
            };
        }
        match self.backend.store().update(collection, uid, partial) {
            Ok(()) => {
                debug!(uid, "node updated");
                Ok(())
            }
            Err(StoreError::Missing { .. }) => Err(Error::NotFound(format!("node '{uid}'"))),
            Err(e) => Err(Error::store(format!("updating {collection}/{uid}"), e)),
        }
    }

    /// Removes a node using the configured cascade policy.
    ///
    /// # Errors
    ///
    /// See [`Self::remove_node_with`].
    pub fn remove_node(&self, uid: &str) -> Result<()> {
        self.remove_node_with(uid, self.backend.config().consistency.cascade)
    }

    /// Removes a node after stripping its uid from every neighbor's adjacency.
    ///
    /// A neighbor that no longer exists is skipped under
    /// [`CascadePolicy::Tolerant`] and fails the call, before any write,
    /// under [`CascadePolicy::Strict`]. Edge records referencing the node
    /// are left in place.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the node (or, in strict mode, a neighbor) is
    /// absent; `Error::Store` if a write fails.
    pub fn remove_node_with(&self, uid: &str, policy: CascadePolicy) -> Result<()> {
        self.remove(uid, policy, false).map(|_| ())
    }

    /// Removes the node only if it has no adjacency left when reloaded.
    /// Returns false, without writing, if it gained a reference since it was
    /// last seen isolated.
    pub(crate) fn remove_if_isolated(&self, uid: &str) -> Result<bool> {
        self.remove(uid, self.backend.config().consistency.cascade, true)
    }

    fn remove(&self, uid: &str, policy: CascadePolicy, only_isolated: bool) -> Result<bool> {
        validate_uid(uid)?;
        let adjacency = self
            .backend
            .load_adjacency(uid)?
            .ok_or_else(|| Error::NotFound(format!("node '{uid}'")))?;
        if only_isolated && !adjacency.is_isolated() {
            warn!(
                uid,
                edges_to = adjacency.edges_to.len(),
                edges_from = adjacency.edges_from.len(),
                "node is no longer isolated, keeping it"
            );
            return Ok(false);
        }

        // inbound neighbors point at us through their edges_to, and vice versa
        let deltas = adjacency
            .edges_from
            .iter()
            .map(|n| AdjacencyDelta::new(n, Direction::Outbound, uid, DeltaOp::Remove))
            .chain(
                adjacency
                    .edges_to
                    .iter()
                    .map(|n| AdjacencyDelta::new(n, Direction::Inbound, uid, DeltaOp::Remove)),
            )
            .filter(|delta| delta.node != uid);

        let mut workset = AdjacencyWorkset::new();
        let mut skipped = BTreeSet::new();
        for delta in deltas {
            if skipped.contains(&delta.node) {
                continue;
            }
            if !self
                .backend
                .load_neighbor(&mut workset, &delta.node, uid, policy)?
            {
                skipped.insert(delta.node.clone());
                continue;
            }
            if workset.apply(&delta) == Some(DeltaOutcome::Unchanged) {
                warn!(
                    uid,
                    neighbor = %delta.node,
                    field = delta.direction.field(),
                    "neighbor did not reference removed node"
                );
            }
        }

        let mut batch = WriteBatch::new();
        self.backend.queue_patches(&mut batch, &workset);
        batch.delete(self.backend.nodes(), uid);
        self.backend
            .commit(batch, &format!("removing node '{uid}'"))?;
        GraphMetrics::add(&self.backend.metrics().nodes_removed, 1);
        debug!(uid, neighbors = workset.len(), "node removed");
        Ok(true)
    }

    /// Returns true if a node with this uid exists. An invalid uid never exists.
    ///
    /// A failing store is reported as an error instead of being read as
    /// "absent", so callers cannot mistake an outage for a missing node.
    ///
    /// # Errors
    ///
    /// `Error::Store` if the probe itself fails.
    pub fn node_exists(&self, uid: &str) -> Result<bool> {
        if validate_uid(uid).is_err() {
            return Ok(false);
        }
        self.backend.exists(self.backend.nodes(), uid)
    }
}
