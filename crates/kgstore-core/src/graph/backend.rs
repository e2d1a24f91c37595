//! Store access shared by the graph repositories.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{CascadePolicy, KgConfig, WriteMode};
use crate::error::{Error, Result};
use crate::metrics::GraphMetrics;
use crate::store::{apply_sequential, Document, DocumentStore, WriteBatch};

use super::adjacency::{AdjacencyWorkset, NodeAdjacency};
use super::types::decode;

/// Store handle, configuration and counters, cloned into every repository.
#[derive(Clone)]
pub(crate) struct GraphBackend {
    store: Arc<dyn DocumentStore>,
    config: Arc<KgConfig>,
    metrics: Arc<GraphMetrics>,
    atomic: bool,
}

impl std::fmt::Debug for GraphBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBackend")
            .field("config", &self.config)
            .field("atomic", &self.atomic)
            .finish_non_exhaustive()
    }
}

impl GraphBackend {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        config: KgConfig,
        metrics: Arc<GraphMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        let atomic = match config.consistency.write_mode {
            WriteMode::Auto => store.supports_atomic_batch(),
            WriteMode::Sequential => false,
            WriteMode::Atomic => {
                if !store.supports_atomic_batch() {
                    return Err(Error::InvalidArgument(
                        "write_mode 'atomic' requires a store with atomic batch support"
                            .to_string(),
                    ));
                }
                true
            }
        };
        Ok(Self {
            store,
            config: Arc::new(config),
            metrics,
            atomic,
        })
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub(crate) fn config(&self) -> &KgConfig {
        &self.config
    }

    pub(crate) fn metrics(&self) -> &Arc<GraphMetrics> {
        &self.metrics
    }

    pub(crate) fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub(crate) fn nodes(&self) -> &str {
        &self.config.collections.nodes
    }

    pub(crate) fn edges(&self) -> &str {
        &self.config.collections.edges
    }

    pub(crate) fn communities(&self) -> &str {
        &self.config.collections.communities
    }

    pub(crate) fn fetch(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        self.store
            .get(collection, key)
            .map_err(|e| Error::store(format!("reading {collection}/{key}"), e))
    }

    pub(crate) fn exists(&self, collection: &str, key: &str) -> Result<bool> {
        self.store
            .exists(collection, key)
            .map_err(|e| Error::store(format!("probing {collection}/{key}"), e))
    }

    pub(crate) fn scan(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        self.store
            .stream(collection)
            .map_err(|e| Error::store(format!("streaming {collection}"), e))
    }

    /// Writes a batch atomically when the resolved write mode allows it,
    /// otherwise one write at a time.
    pub(crate) fn commit(&self, batch: WriteBatch, context: &str) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let writes = batch.len();
        let result = if self.atomic {
            self.store.commit(batch)
        } else {
            apply_sequential(self.store.as_ref(), batch)
        };
        result.map_err(|e| Error::store(context, e))?;
        GraphMetrics::add(&self.metrics.batches_committed, 1);
        debug!(context, writes, atomic = self.atomic, "committed write batch");
        Ok(())
    }

    /// Reads only the adjacency fields of a node.
    pub(crate) fn load_adjacency(&self, uid: &str) -> Result<Option<NodeAdjacency>> {
        match self.fetch(self.nodes(), uid)? {
            Some(doc) => decode(doc, &format!("adjacency of node '{uid}'")).map(Some),
            None => Ok(None),
        }
    }

    /// Loads a node that the operation cannot proceed without.
    pub(crate) fn load_required(&self, workset: &mut AdjacencyWorkset, uid: &str) -> Result<()> {
        if workset.contains(uid) {
            return Ok(());
        }
        let adjacency = self
            .load_adjacency(uid)?
            .ok_or_else(|| Error::NotFound(format!("node '{uid}'")))?;
        workset.load(uid, adjacency);
        Ok(())
    }

    /// Loads a node touched as a side effect of a mutation on `origin`.
    ///
    /// Returns `Ok(false)` when the node is missing and the policy tolerates it.
    pub(crate) fn load_neighbor(
        &self,
        workset: &mut AdjacencyWorkset,
        uid: &str,
        origin: &str,
        policy: CascadePolicy,
    ) -> Result<bool> {
        if workset.contains(uid) {
            return Ok(true);
        }
        match self.load_adjacency(uid)? {
            Some(adjacency) => {
                workset.load(uid, adjacency);
                Ok(true)
            }
            None => match policy {
                CascadePolicy::Tolerant => {
                    warn!(uid, origin, "skipping missing neighbor");
                    GraphMetrics::add(&self.metrics.cascade_skips, 1);
                    Ok(false)
                }
                CascadePolicy::Strict => Err(Error::NotFound(format!(
                    "node '{uid}' (neighbor of '{origin}')"
                ))),
            },
        }
    }

    /// Queues one partial update per changed node.
    pub(crate) fn queue_patches(&self, batch: &mut WriteBatch, workset: &AdjacencyWorkset) {
        for (uid, patch) in workset.patches() {
            batch.update(self.nodes(), &uid, patch);
        }
    }
}
