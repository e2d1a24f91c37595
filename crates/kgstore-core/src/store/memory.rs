//! In-memory document store.
//!
//! Reference backend for tests and embedded use. All collections live behind
//! one `RwLock`, which lets [`InMemoryDocumentStore::commit`] apply a whole
//! batch atomically.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use super::{Document, DocumentStore, StoreError, VectorQuery, WriteBatch, WriteOp};

type Collections = HashMap<String, HashMap<String, Document>>;

/// In-memory storage for schemaless documents grouped in named collections.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    /// collection -> key -> document.
    collections: RwLock<Collections>,
    /// collection -> indexed embedding field.
    vector_indexes: HashMap<String, String>,
    /// When set, batches fall back to sequential application.
    sequential_batches: bool,
}

impl InMemoryDocumentStore {
    /// Creates an empty store with atomic batches and no vector index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a vector index over `field` in `collection` (builder pattern).
    #[must_use]
    pub fn with_vector_index(mut self, collection: &str, field: &str) -> Self {
        self.vector_indexes
            .insert(collection.to_string(), field.to_string());
        self
    }

    /// Disables atomic batches so commits go through the sequential fallback.
    #[must_use]
    pub fn with_sequential_batches(mut self) -> Self {
        self.sequential_batches = true;
        self
    }

    /// Returns the number of documents in a collection.
    #[must_use]
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, HashMap::len)
    }

    fn apply_locked(collections: &mut Collections, op: WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::Set {
                collection,
                key,
                doc,
            } => {
                collections.entry(collection).or_default().insert(key, doc);
            }
            WriteOp::Merge {
                collection,
                key,
                doc,
            } => {
                let existing = collections
                    .entry(collection)
                    .or_default()
                    .entry(key)
                    .or_default();
                existing.extend(doc);
            }
            WriteOp::Update {
                collection,
                key,
                partial,
            } => {
                let existing = collections
                    .get_mut(&collection)
                    .and_then(|docs| docs.get_mut(&key))
                    .ok_or_else(|| StoreError::Missing {
                        collection: collection.clone(),
                        key: key.clone(),
                    })?;
                existing.extend(partial);
            }
            WriteOp::Delete { collection, key } => {
                if let Some(docs) = collections.get_mut(&collection) {
                    docs.remove(&key);
                }
            }
        }
        Ok(())
    }

    /// Rejects a batch whose updates would hit absent documents, taking
    /// earlier writes of the same batch into account.
    fn validate_batch(collections: &Collections, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut overlay: HashMap<(&str, &str), bool> = HashMap::new();
        for op in batch.iter() {
            let slot = (op.collection(), op.key());
            let exists = overlay.get(&slot).copied().unwrap_or_else(|| {
                collections
                    .get(slot.0)
                    .is_some_and(|docs| docs.contains_key(slot.1))
            });
            match op {
                WriteOp::Update { .. } if !exists => {
                    return Err(StoreError::Missing {
                        collection: slot.0.to_string(),
                        key: slot.1.to_string(),
                    });
                }
                WriteOp::Delete { .. } => {
                    overlay.insert(slot, false);
                }
                _ => {
                    overlay.insert(slot, true);
                }
            }
        }
        Ok(())
    }
}

/// Reads a JSON array of numbers as an `f32` embedding.
// Reason: embeddings are stored as JSON numbers (f64) but compared as f32.
#[allow(clippy::cast_possible_truncation)]
fn as_embedding(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), doc);
        Ok(())
    }

    fn set_merge(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        Self::apply_locked(
            &mut self.collections.write(),
            WriteOp::Merge {
                collection: collection.to_string(),
                key: key.to_string(),
                doc,
            },
        )
    }

    fn update(&self, collection: &str, key: &str, partial: Document) -> Result<(), StoreError> {
        Self::apply_locked(
            &mut self.collections.write(),
            WriteOp::Update {
                collection: collection.to_string(),
                key: key.to_string(),
                partial,
            },
        )
    }

    fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.collections.write().get_mut(collection) {
            docs.remove(key);
        }
        Ok(())
    }

    fn stream(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, doc)| (key.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_nearest(
        &self,
        collection: &str,
        query: &VectorQuery,
    ) -> Result<Vec<Document>, StoreError> {
        match self.vector_indexes.get(collection) {
            Some(field) if *field == query.field => {}
            _ => {
                return Err(StoreError::Unsupported(format!(
                    "no vector index on '{collection}.{}'",
                    query.field
                )))
            }
        }

        let guard = self.collections.read();
        let Some(docs) = guard.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &Document)> = docs
            .values()
            .filter_map(|doc| {
                let embedding = as_embedding(doc.get(&query.field)?)?;
                (embedding.len() == query.vector.len())
                    .then(|| (query.metric.distance(&query.vector, &embedding), doc))
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(query.limit)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    fn supports_atomic_batch(&self) -> bool {
        !self.sequential_batches
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.sequential_batches {
            return super::apply_sequential(self, batch);
        }
        let mut guard = self.collections.write();
        Self::validate_batch(&guard, &batch)?;
        for op in batch.into_ops() {
            Self::apply_locked(&mut guard, op)?;
        }
        Ok(())
    }
}
