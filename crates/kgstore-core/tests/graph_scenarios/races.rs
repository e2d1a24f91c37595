//! Races between concurrent writers.
//!
//! Every mutation reads adjacency, computes the new sets and writes them
//! back. `InterleavingStore` runs a second writer between another writer's
//! read and its first write (or right after a scan), which reproduces each
//! race deterministically.

use std::sync::Arc;

use parking_lot::Mutex;

use kgstore_core::store::{Document, WriteBatch};
use kgstore_core::{
    DocumentStore, EdgeRecord, InMemoryDocumentStore, KnowledgeGraph, StoreError,
};

use crate::helpers::{add_nodes, adjacency, consistency_violations, init_tracing, set};

type Hook = Box<dyn FnOnce() + Send>;

/// Runs one-shot hooks right before the next write or right after the next
/// scan it receives.
struct InterleavingStore {
    inner: Arc<InMemoryDocumentStore>,
    atomic: bool,
    hook: Mutex<Option<Hook>>,
    scan_hook: Mutex<Option<Hook>>,
}

impl InterleavingStore {
    fn new(inner: Arc<InMemoryDocumentStore>, atomic: bool) -> Self {
        Self {
            inner,
            atomic,
            hook: Mutex::new(None),
            scan_hook: Mutex::new(None),
        }
    }

    fn after_next_scan(&self, hook: Hook) {
        *self.scan_hook.lock() = Some(hook);
    }

    fn before_next_write(&self, hook: Hook) {
        *self.hook.lock() = Some(hook);
    }

    fn run_hook(&self) {
        let hook = self.hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn run_scan_hook(&self) {
        let hook = self.scan_hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl DocumentStore for InterleavingStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, key)
    }

    fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        self.run_hook();
        self.inner.set(collection, key, doc)
    }

    fn set_merge(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        self.run_hook();
        self.inner.set_merge(collection, key, doc)
    }

    fn update(&self, collection: &str, key: &str, partial: Document) -> Result<(), StoreError> {
        self.run_hook();
        self.inner.update(collection, key, partial)
    }

    fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.run_hook();
        self.inner.delete(collection, key)
    }

    fn stream(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let records = self.inner.stream(collection)?;
        self.run_scan_hook();
        Ok(records)
    }

    fn supports_atomic_batch(&self) -> bool {
        self.atomic
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if !self.atomic {
            return kgstore_core::store::apply_sequential(self, batch);
        }
        self.run_hook();
        self.inner.commit(batch)
    }
}

fn race_two_additions(atomic: bool) {
    init_tracing("debug");
    let inner = Arc::new(InMemoryDocumentStore::new());
    let other = KnowledgeGraph::new(inner.clone()).unwrap();
    add_nodes(&other, &["A", "B", "C"]);

    let racing = Arc::new(InterleavingStore::new(inner.clone(), atomic));
    let graph = KnowledgeGraph::new(racing.clone()).unwrap();
    assert_eq!(graph.uses_atomic_batches(), atomic);

    racing.before_next_write(Box::new(move || {
        other
            .add_edge(&EdgeRecord::directed("A", "C", "").unwrap())
            .unwrap();
    }));
    graph
        .add_edge(&EdgeRecord::directed("A", "B", "").unwrap())
        .unwrap();

    // both calls succeeded and both records exist ...
    assert!(graph.edge_exists("A", "B").unwrap());
    assert!(graph.edge_exists("A", "C").unwrap());
    assert_eq!(adjacency(&graph, "C").1, set(&["A"]));
    // ... but the stale write of A's edges_to dropped C
    assert_eq!(adjacency(&graph, "A").0, set(&["B"]));
    assert_eq!(
        consistency_violations(inner.as_ref()),
        vec!["C missing from A.edges_to".to_string()]
    );

    // re-applying the lost edge repairs the adjacency
    graph
        .update_edge(&EdgeRecord::directed("A", "C", "").unwrap())
        .unwrap();
    assert_eq!(adjacency(&graph, "A").0, set(&["B", "C"]));
    assert!(consistency_violations(inner.as_ref()).is_empty());
}

#[test]
fn concurrent_add_edge_loses_update_with_sequential_writes() {
    race_two_additions(false);
}

#[test]
fn concurrent_add_edge_loses_update_with_atomic_batches() {
    race_two_additions(true);
}

fn prune_after_concurrent_edge(atomic: bool) {
    init_tracing("debug");
    let inner = Arc::new(InMemoryDocumentStore::new());
    let other = KnowledgeGraph::new(inner.clone()).unwrap();
    add_nodes(&other, &["A", "B", "C"]);

    let racing = Arc::new(InterleavingStore::new(inner.clone(), atomic));
    let graph = KnowledgeGraph::new(racing.clone()).unwrap();

    // all three are isolated at scan time; A and B get connected right after
    racing.after_next_scan(Box::new(move || {
        other
            .add_edge(&EdgeRecord::directed("A", "B", "").unwrap())
            .unwrap();
    }));
    let removed = graph.clean_zero_degree_nodes().unwrap();

    assert_eq!(removed, vec!["C".to_string()]);
    assert!(graph.node_exists("A").unwrap());
    assert!(graph.node_exists("B").unwrap());
    assert!(!graph.node_exists("C").unwrap());
    assert!(graph.edge_exists("A", "B").unwrap());
    assert_eq!(adjacency(&graph, "A").0, set(&["B"]));
    assert_eq!(adjacency(&graph, "B").1, set(&["A"]));
    assert!(consistency_violations(inner.as_ref()).is_empty());
}

#[test]
fn clean_zero_degree_keeps_nodes_connected_after_scan_with_sequential_writes() {
    prune_after_concurrent_edge(false);
}

#[test]
fn clean_zero_degree_keeps_nodes_connected_after_scan_with_atomic_batches() {
    prune_after_concurrent_edge(true);
}
