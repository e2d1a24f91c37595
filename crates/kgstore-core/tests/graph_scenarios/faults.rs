//! Partial-failure outcomes.
//!
//! `FaultyStore` fails one chosen write. In sequential mode the writes before
//! it stay applied; in atomic mode the batch is rejected as a whole.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use kgstore_core::store::{Document, WriteBatch};
use kgstore_core::{
    DocumentStore, EdgeRecord, Error, ErrorKind, InMemoryDocumentStore, KnowledgeGraph,
    NodeRecord, StoreError,
};

use crate::helpers::{adjacency, consistency_violations, init_tracing, set};

/// Wraps the in-memory store and fails the n-th write (1-based) once armed.
struct FaultyStore {
    inner: InMemoryDocumentStore,
    atomic: bool,
    fail_at: AtomicUsize,
    writes: AtomicUsize,
    batch_fault: AtomicBool,
}

impl FaultyStore {
    fn new(atomic: bool) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            atomic,
            fail_at: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            batch_fault: AtomicBool::new(false),
        }
    }

    /// Fails the `n`-th write from now.
    fn fail_write(&self, n: usize) {
        self.writes.store(0, Ordering::SeqCst);
        self.fail_at.store(n, Ordering::SeqCst);
        self.batch_fault.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.fail_at.store(0, Ordering::SeqCst);
        self.batch_fault.store(false, Ordering::SeqCst);
    }

    fn tick(&self) -> Result<(), StoreError> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_at.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected fault on write {n}")));
        }
        Ok(())
    }
}

impl DocumentStore for FaultyStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, key)
    }

    fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        self.tick()?;
        self.inner.set(collection, key, doc)
    }

    fn set_merge(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        self.tick()?;
        self.inner.set_merge(collection, key, doc)
    }

    fn update(&self, collection: &str, key: &str, partial: Document) -> Result<(), StoreError> {
        self.tick()?;
        self.inner.update(collection, key, partial)
    }

    fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.tick()?;
        self.inner.delete(collection, key)
    }

    fn stream(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.stream(collection)
    }

    fn supports_atomic_batch(&self) -> bool {
        self.atomic
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if !self.atomic {
            return kgstore_core::store::apply_sequential(self, batch);
        }
        if self.batch_fault.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected transaction abort".to_string()));
        }
        self.inner.commit(batch)
    }
}

fn setup(atomic: bool) -> (Arc<FaultyStore>, KnowledgeGraph) {
    init_tracing("debug");
    let store = Arc::new(FaultyStore::new(atomic));
    let graph = KnowledgeGraph::new(store.clone()).expect("open graph");
    for uid in ["A", "B"] {
        graph.add_node(uid, &NodeRecord::new(uid, "")).unwrap();
    }
    (store, graph)
}

fn batch_progress(err: &Error) -> Option<(usize, usize)> {
    match err {
        Error::Store {
            source: StoreError::BatchFailed { applied, total, .. },
            ..
        } => Some((*applied, *total)),
        _ => None,
    }
}

#[test]
fn sequential_add_edge_stops_part_way_and_retry_repairs() {
    let (store, graph) = setup(false);
    let edge = EdgeRecord::undirected("A", "B", "").unwrap();

    // writes: A adjacency, B adjacency, A_to_B, B_to_A
    store.fail_write(2);
    let err = graph.add_edge(&edge).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(batch_progress(&err), Some((1, 4)));

    // one-sided adjacency, no edge record
    assert_eq!(adjacency(&graph, "A"), (set(&["B"]), set(&["B"])));
    assert_eq!(adjacency(&graph, "B"), (set(&[]), set(&[])));
    assert!(!graph.edge_exists("A", "B").unwrap());
    assert!(!consistency_violations(&store.inner).is_empty());

    store.disarm();
    graph.add_edge(&edge).unwrap();
    assert!(consistency_violations(&store.inner).is_empty());
    assert_eq!(adjacency(&graph, "B"), (set(&["A"]), set(&["A"])));
}

#[test]
fn sequential_remove_edge_failure_is_detected_later() {
    let (store, graph) = setup(false);
    graph
        .add_edge(&EdgeRecord::directed("A", "B", "").unwrap())
        .unwrap();

    // writes: A adjacency, B adjacency, delete A_to_B
    store.fail_write(3);
    assert_eq!(
        graph.remove_edge("A", "B").unwrap_err().kind(),
        ErrorKind::Store
    );
    store.disarm();

    // record survived but adjacency is gone: divergence is reported, not hidden
    assert!(graph.edge_exists("A", "B").unwrap());
    assert_eq!(
        graph.remove_edge("A", "B").unwrap_err().kind(),
        ErrorKind::InvalidState
    );

    // update_edge restores the missing entries, after which removal succeeds
    graph
        .update_edge(&EdgeRecord::directed("A", "B", "").unwrap())
        .unwrap();
    graph.remove_edge("A", "B").unwrap();
    assert!(consistency_violations(&store.inner).is_empty());
}

#[test]
fn sequential_remove_node_failure_keeps_node() {
    let (store, graph) = setup(false);
    graph
        .add_edge(&EdgeRecord::directed("A", "B", "").unwrap())
        .unwrap();

    // writes: B adjacency, delete A
    store.fail_write(2);
    assert_eq!(graph.remove_node("A").unwrap_err().kind(), ErrorKind::Store);
    store.disarm();

    assert!(graph.node_exists("A").unwrap());
    assert!(adjacency(&graph, "B").1.is_empty());
    // the retry completes the removal
    graph.remove_node("A").unwrap();
    assert!(!graph.node_exists("A").unwrap());
}

#[test]
fn atomic_add_edge_failure_leaves_no_trace() {
    let (store, graph) = setup(true);
    assert!(graph.uses_atomic_batches());

    store.fail_write(1);
    let err = graph
        .add_edge(&EdgeRecord::undirected("A", "B", "").unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(batch_progress(&err), None);

    assert_eq!(adjacency(&graph, "A"), (set(&[]), set(&[])));
    assert_eq!(adjacency(&graph, "B"), (set(&[]), set(&[])));
    assert_eq!(store.inner.document_count("edges"), 0);
}

#[test]
fn read_failures_are_wrapped_with_context() {
    struct Offline;

    impl DocumentStore for Offline {
        fn get(&self, _: &str, _: &str) -> Result<Option<Document>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        fn set(&self, _: &str, _: &str, _: Document) -> Result<(), StoreError> {
            Ok(())
        }
        fn set_merge(&self, _: &str, _: &str, _: Document) -> Result<(), StoreError> {
            Ok(())
        }
        fn update(&self, _: &str, _: &str, _: Document) -> Result<(), StoreError> {
            Ok(())
        }
        fn delete(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
        fn stream(&self, _: &str) -> Result<Vec<(String, Document)>, StoreError> {
            Ok(Vec::new())
        }
    }

    let graph = KnowledgeGraph::new(Arc::new(Offline)).unwrap();
    let err = graph.get_node("A").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    let message = err.to_string();
    assert!(message.contains("nodes/A"), "{message}");
    assert!(message.contains("connection refused"), "{message}");
    // probes propagate store errors too
    assert_eq!(graph.node_exists("A").unwrap_err().kind(), ErrorKind::Store);
}
