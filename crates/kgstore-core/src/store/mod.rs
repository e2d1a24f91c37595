//! Document store abstraction.
//!
//! The graph engine only needs per-document CRUD and full collection scans
//! from its backend. Nothing here promises cross-document atomicity: a store
//! that can apply a [`WriteBatch`] atomically says so through
//! [`DocumentStore::supports_atomic_batch`], every other store gets the
//! best-effort sequential fallback ([`apply_sequential`]).

mod memory;

use serde_json::Value;
use thiserror::Error;

use crate::distance::DistanceMetric;

pub use memory::InMemoryDocumentStore;

/// A schemaless record: top-level field name to JSON value.
pub type Document = serde_json::Map<String, Value>;

/// Backend failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A partial update targeted a document that does not exist.
    #[error("document '{collection}/{key}' does not exist")]
    Missing {
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
    },

    /// The backend lacks a capability (vector index, ...).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A sequential batch stopped part way through.
    #[error("batch stopped after {applied} of {total} writes: {source}")]
    BatchFailed {
        /// Writes that were applied before the failure.
        applied: usize,
        /// Writes in the batch.
        total: usize,
        /// The failing write's error.
        #[source]
        source: Box<StoreError>,
    },
}

/// Nearest-neighbor request handed to a store's vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    /// Indexed field holding the embedding.
    pub field: String,
    /// Query embedding.
    pub vector: Vec<f32>,
    /// Maximum number of documents returned.
    pub limit: usize,
    /// Ranking measure.
    pub metric: DistanceMetric,
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Overwrite the whole document.
    Set {
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
        /// New document.
        doc: Document,
    },
    /// Upsert, merging top-level fields into any existing document.
    Merge {
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
        /// Fields to merge.
        doc: Document,
    },
    /// Merge top-level fields into an existing document.
    Update {
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
        /// Fields to overwrite.
        partial: Document,
    },
    /// Delete the document; deleting an absent document succeeds.
    Delete {
        /// Collection name.
        collection: String,
        /// Document key.
        key: String,
    },
}

impl WriteOp {
    /// Returns the collection this write targets.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Set { collection, .. }
            | Self::Merge { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }

    /// Returns the document key this write targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. }
            | Self::Merge { key, .. }
            | Self::Update { key, .. }
            | Self::Delete { key, .. } => key,
        }
    }
}

/// Ordered list of writes belonging to one graph mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an overwrite.
    pub fn set(&mut self, collection: &str, key: &str, doc: Document) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            key: key.to_string(),
            doc,
        });
        self
    }

    /// Appends a merging upsert.
    pub fn merge(&mut self, collection: &str, key: &str, doc: Document) -> &mut Self {
        self.ops.push(WriteOp::Merge {
            collection: collection.to_string(),
            key: key.to_string(),
            doc,
        });
        self
    }

    /// Appends a partial update.
    pub fn update(&mut self, collection: &str, key: &str, partial: Document) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            key: key.to_string(),
            partial,
        });
        self
    }

    /// Appends a delete.
    pub fn delete(&mut self, collection: &str, key: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            key: key.to_string(),
        });
        self
    }

    /// Number of writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch holds no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates over the writes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, WriteOp> {
        self.ops.iter()
    }

    /// Consumes the batch, returning its writes.
    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Keyed collections of schemaless documents.
///
/// Implementors MUST be `Send + Sync`. No method is required to be atomic
/// with respect to any other call.
pub trait DocumentStore: Send + Sync {
    /// Fetches a document; `Ok(None)` when absent.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Overwrites (or creates) a document.
    fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError>;

    /// Creates a document or merges top-level fields into the existing one.
    fn set_merge(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError>;

    /// Merges top-level fields into an existing document.
    ///
    /// Returns [`StoreError::Missing`] if the document does not exist.
    fn update(&self, collection: &str, key: &str, partial: Document) -> Result<(), StoreError>;

    /// Deletes a document. Deleting an absent document succeeds.
    fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    /// Returns every `(key, document)` pair of a collection, in no particular order.
    fn stream(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;

    /// Existence probe.
    fn exists(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(collection, key)?.is_some())
    }

    /// Ranked nearest-neighbor query against the store's vector index.
    ///
    /// The index must be provisioned on the store beforehand.
    fn find_nearest(
        &self,
        collection: &str,
        query: &VectorQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let _ = query;
        Err(StoreError::Unsupported(format!(
            "no vector index on collection '{collection}'"
        )))
    }

    /// Returns true if [`DocumentStore::commit`] applies a batch all-or-nothing.
    fn supports_atomic_batch(&self) -> bool {
        false
    }

    /// Applies a batch of writes.
    ///
    /// The default is [`apply_sequential`]: writes go out one by one and the
    /// first failure stops the batch, leaving earlier writes in place.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        apply_sequential(self, batch)
    }
}

/// Applies a batch one write at a time, without rollback.
///
/// On failure the returned [`StoreError::BatchFailed`] reports how many
/// writes had already been applied.
pub fn apply_sequential<S: DocumentStore + ?Sized>(
    store: &S,
    batch: WriteBatch,
) -> Result<(), StoreError> {
    let total = batch.len();
    for (applied, op) in batch.into_ops().into_iter().enumerate() {
        let result = match op {
            WriteOp::Set {
                collection,
                key,
                doc,
            } => store.set(&collection, &key, doc),
            WriteOp::Merge {
                collection,
                key,
                doc,
            } => store.set_merge(&collection, &key, doc),
            WriteOp::Update {
                collection,
                key,
                partial,
            } => store.update(&collection, &key, partial),
            WriteOp::Delete { collection, key } => store.delete(&collection, &key),
        };
        if let Err(source) = result {
            return Err(StoreError::BatchFailed {
                applied,
                total,
                source: Box::new(source),
            });
        }
    }
    Ok(())
}
